//! Reconcile loop: re-invokes the driver until told to stop.
//!
//! Each pass runs on the blocking pool since the store calls are
//! synchronous. The loop never retries inside a pass; a `Failed` or
//! `InProgress` result simply waits for the next tick.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use cloudkeep_core::{Installation, KeeperConfig};
use cloudkeep_reconcile::{
    Cancellation, ClusterClient, Phase, Reconciler, ReconcilerSettings, SecretParameterSource,
    TracingNotifier,
};
use cloudkeep_state::StateStore;

/// When the loop may stop on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Keep re-checking after convergence until shutdown.
    Watch,
    /// Stop at the first `Completed` pass.
    UntilCompleted,
}

/// Build a reconciler over the store in `data_dir`.
pub fn open_reconciler(config: &KeeperConfig, data_dir: &Path) -> anyhow::Result<Reconciler> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("cloudkeep.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let client: Arc<dyn ClusterClient> = Arc::new(store);
    let parameters = Arc::new(SecretParameterSource::new(
        client.clone(),
        SecretParameterSource::DEFAULT_SECRET,
    ));
    Ok(Reconciler::new(
        client,
        parameters,
        Arc::new(TracingNotifier),
        ReconcilerSettings::from_config(config),
    ))
}

/// Run passes every `interval` until the mode says stop or shutdown fires.
///
/// Returns the last phase observed, or `None` if shutdown came first.
pub async fn run(
    reconciler: Arc<Reconciler>,
    installation: Installation,
    uninstall: bool,
    mode: LoopMode,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Option<Phase>> {
    info!(
        installation = %installation.name,
        uninstall,
        interval_secs = interval.as_secs(),
        "reconcile loop started"
    );
    let installation = Arc::new(installation);
    let mut last = None;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let cancel = Cancellation::new(shutdown.clone());
        let pass_reconciler = reconciler.clone();
        let pass_installation = installation.clone();
        let phase = tokio::task::spawn_blocking(move || {
            pass_reconciler.reconcile(&pass_installation, uninstall, &cancel)
        })
        .await?;

        if let Phase::Failed { step, reason } = &phase {
            debug!(%step, %reason, "pass failed, retrying next interval");
        }
        let done = phase.is_completed() && mode == LoopMode::UntilCompleted;
        last = Some(phase);
        if done {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                info!("reconcile loop shutting down");
                break;
            }
        }
    }

    Ok(last)
}
