//! Cooperative cancellation for a reconcile pass.

use tokio::sync::watch;

use crate::error::{ReconcileError, ReconcileResult};

/// Caller-supplied cancellation signal, checked before every boundary call.
///
/// Wraps the same `watch::Receiver<bool>` the daemon uses for shutdown; the
/// pass is cancelled once the channel holds `true`.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    rx: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// `Err(Cancelled)` once the signal has fired.
    pub fn check(&self) -> ReconcileResult<()> {
        if self.is_cancelled() {
            return Err(ReconcileError::Cancelled);
        }
        Ok(())
    }
}
