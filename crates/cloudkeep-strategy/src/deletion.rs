//! Destructive delete strategies installed before claims are deleted.
//!
//! The provider's default delete strategy keeps a final snapshot (or refuses
//! to delete non-empty buckets). During uninstall nothing will consume that
//! snapshot, so each kind gets a strategy that skips it.

use serde::Serialize;
use serde_json::value::RawValue;

use cloudkeep_core::ResourceKind;

use crate::error::StrategyResult;

/// Database delete input: no final snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PostgresDeleteStrategy {
    #[serde(rename = "SkipFinalSnapshot")]
    pub skip_final_snapshot: bool,
}

/// Cache delete input: an empty identifier means no final snapshot is taken.
#[derive(Debug, Clone, Serialize)]
pub struct RedisDeleteStrategy {
    #[serde(rename = "FinalSnapshotIdentifier")]
    pub final_snapshot_identifier: String,
}

/// Bucket delete input: delete even when objects remain.
#[derive(Debug, Clone, Serialize)]
pub struct BlobStorageDeleteStrategy {
    #[serde(rename = "forceBucketDeletion")]
    pub force_bucket_deletion: bool,
}

/// The encoded destructive delete strategy for `kind`.
pub fn destructive_delete_strategy(kind: ResourceKind) -> StrategyResult<Box<RawValue>> {
    let raw = match kind {
        ResourceKind::Postgres => serde_json::value::to_raw_value(&PostgresDeleteStrategy {
            skip_final_snapshot: true,
        })?,
        ResourceKind::Redis => serde_json::value::to_raw_value(&RedisDeleteStrategy {
            final_snapshot_identifier: String::new(),
        })?,
        ResourceKind::BlobStorage => {
            serde_json::value::to_raw_value(&BlobStorageDeleteStrategy {
                force_bucket_deletion: true,
            })?
        }
    };
    Ok(raw)
}
