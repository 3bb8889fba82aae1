//! Reconciler error types.

use thiserror::Error;

use cloudkeep_state::StateError;
use cloudkeep_strategy::StrategyError;

/// Errors that fail a reconcile pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to {action} {kind} in namespace {namespace}: {source}")]
    Store {
        action: &'static str,
        kind: String,
        namespace: String,
        #[source]
        source: StateError,
    },

    #[error("strategy config {namespace}/{name}: {source}")]
    Strategy {
        namespace: String,
        name: String,
        #[source]
        source: StrategyError,
    },

    #[error("failed to read parameter {key} in namespace {namespace}: {source}")]
    Parameter {
        namespace: String,
        key: String,
        #[source]
        source: StateError,
    },

    #[error("credentials secret {name} not found in namespace {namespace}")]
    MissingCredentials { namespace: String, name: String },

    #[error("reconcile cancelled")]
    Cancelled,
}

impl ReconcileError {
    /// Wrap a store error with what was being done, to which kind, where.
    pub fn store(
        action: &'static str,
        kind: impl Into<String>,
        namespace: &str,
        source: StateError,
    ) -> Self {
        ReconcileError::Store {
            action,
            kind: kind.into(),
            namespace: namespace.to_string(),
            source,
        }
    }

    /// True when a configuration write lost a generation race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Store { source, .. } if source.is_conflict())
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
