//! Shared types used across cloudkeep crates.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tier name used for the production deployment class.
pub const TIER_PRODUCTION: &str = "production";

/// Key of the network strategy document inside the strategy configuration object.
pub const NETWORK_STRATEGY_KEY: &str = "_network";

/// Extension schema whose presence means resource claims can exist at all.
/// The claim kinds are installed together, so the postgres schema stands in
/// for all three.
pub const CLAIM_SCHEMA: &str = "postgres.integreatly.org";

/// Extension schema that gates snapshot removal for both snapshot kinds.
pub const SNAPSHOT_SCHEMA: &str = "postgressnapshots.integreatly.org";

/// Kind of cloud-backed resource a claim can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Relational database.
    Postgres,
    /// In-memory cache.
    Redis,
    /// Object storage bucket.
    BlobStorage,
}

impl ResourceKind {
    /// All kinds, in teardown order.
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Postgres,
        ResourceKind::Redis,
        ResourceKind::BlobStorage,
    ];

    /// Key of this kind's strategy document in the strategy configuration object.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Postgres => "postgres",
            ResourceKind::Redis => "redis",
            ResourceKind::BlobStorage => "blobstorage",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown resource kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(ResourceKind::Postgres),
            "redis" => Ok(ResourceKind::Redis),
            "blobstorage" => Ok(ResourceKind::BlobStorage),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// Kind of backup artifact. Only stateful resources produce snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Postgres,
    Redis,
}

impl SnapshotKind {
    pub const ALL: [SnapshotKind; 2] = [SnapshotKind::Postgres, SnapshotKind::Redis];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Postgres => "postgressnapshot",
            SnapshotKind::Redis => "redissnapshot",
        }
    }

    /// The claim kind this snapshot is taken from.
    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            SnapshotKind::Postgres => ResourceKind::Postgres,
            SnapshotKind::Redis => ResourceKind::Redis,
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The owning platform instance. Read-only during a reconcile pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installation {
    pub name: String,
    /// Namespace holding claims, snapshots and the strategy configuration object.
    pub namespace: String,
    /// Prefix applied to every product namespace.
    pub namespace_prefix: String,
    /// Unix timestamp (seconds) when the installation was created.
    pub created_at: u64,
    /// When true, resources live on cluster storage and no cloud strategy override is needed.
    pub use_cluster_storage: bool,
    /// Run operators in the product namespace instead of a dedicated `-operator` one.
    pub operators_in_product_namespace: bool,
    /// Cloud credentials are short-lived tokens read from a secret.
    pub sts: bool,
}

impl Installation {
    /// Age of the installation relative to `now` (unix seconds).
    ///
    /// Clock skew that puts `created_at` in the future yields zero.
    pub fn age(&self, now: u64) -> Duration {
        Duration::from_secs(now.saturating_sub(self.created_at))
    }
}
