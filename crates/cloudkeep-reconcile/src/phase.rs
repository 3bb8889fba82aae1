//! Tri-state convergence result returned to the external scheduler.

use std::fmt;

/// Outcome of a reconcile step or of a whole pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Desired state reached; nothing left to do.
    Completed,
    /// Work was issued or is pending elsewhere; invoke again later.
    InProgress,
    /// The named step failed. Re-invoking restarts the pass from the top.
    Failed { step: String, reason: String },
}

impl Phase {
    pub fn failed(step: &str, reason: impl fmt::Display) -> Self {
        Phase::Failed {
            step: step.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Phase::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Phase::Failed { .. })
    }

    /// Run `next` only if this phase is `Completed`.
    pub fn then(self, next: impl FnOnce() -> Phase) -> Phase {
        match self {
            Phase::Completed => next(),
            other => other,
        }
    }

    /// Evaluate `steps` in order and return the first result that is not
    /// `Completed`. Steps after it are never run.
    pub fn first_incomplete<I, F>(steps: I) -> Phase
    where
        I: IntoIterator<Item = F>,
        F: FnOnce() -> Phase,
    {
        steps
            .into_iter()
            .fold(Phase::Completed, |acc, step| acc.then(step))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Completed => f.write_str("completed"),
            Phase::InProgress => f.write_str("in progress"),
            Phase::Failed { step, reason } => write!(f, "failed in {step}: {reason}"),
        }
    }
}
