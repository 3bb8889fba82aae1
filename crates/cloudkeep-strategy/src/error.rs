//! Strategy document error types.

use thiserror::Error;

/// Errors that can occur while decoding or patching strategy documents.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("malformed strategy document {key}: {source}")]
    MalformedDocument {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed {field} in tier {tier}: {source}")]
    MalformedField {
        tier: String,
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode strategy value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid time window {value:?}: {reason}")]
    InvalidTimeWindow { value: String, reason: &'static str },
}

pub type StrategyResult<T> = Result<T, StrategyError>;
