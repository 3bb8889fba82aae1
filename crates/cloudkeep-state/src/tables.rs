//! redb table definitions for the cloudkeep state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).

use redb::TableDefinition;

/// Namespaces keyed by `{name}`.
pub const NAMESPACES: TableDefinition<&str, &[u8]> = TableDefinition::new("namespaces");

/// Extension schema definitions keyed by `{name}`.
pub const SCHEMAS: TableDefinition<&str, &[u8]> = TableDefinition::new("schemas");

/// Resource claims keyed by `{kind}/{namespace}/{name}`.
pub const CLAIMS: TableDefinition<&str, &[u8]> = TableDefinition::new("claims");

/// Snapshot records keyed by `{kind}/{namespace}/{name}`.
pub const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Secrets keyed by `{namespace}/{name}`.
pub const SECRETS: TableDefinition<&str, &[u8]> = TableDefinition::new("secrets");

/// Configuration objects keyed by `{namespace}/{name}`.
pub const CONFIGS: TableDefinition<&str, &[u8]> = TableDefinition::new("configs");
