//! Record types for the cloudkeep state store.
//!
//! These mirror the objects the reconciler reads and writes through the
//! declarative API. All types are serializable to/from JSON for storage in
//! redb tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use cloudkeep_core::{ResourceKind, SnapshotKind};

// ── Namespace ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamespaceRecord {
    pub name: String,
    pub labels: BTreeMap<String, String>,
    /// Unix timestamp (seconds) when the namespace was created.
    pub created_at: u64,
}

// ── Extension schema ──────────────────────────────────────────────

/// An installed extension schema (custom resource definition).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaDefinition {
    /// Fully qualified name, e.g. `postgres.integreatly.org`.
    pub name: String,
}

// ── Claims and snapshots ──────────────────────────────────────────

/// A namespaced request for a provisioned external resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceClaim {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    /// Deployment tier the claim was provisioned for.
    pub tier: String,
}

impl ResourceClaim {
    /// Build the composite key for the claims table.
    pub fn table_key(&self) -> String {
        claim_key(self.kind, &self.namespace, &self.name)
    }
}

pub(crate) fn claim_key(kind: ResourceKind, namespace: &str, name: &str) -> String {
    format!("{}/{}/{}", kind.as_str(), namespace, name)
}

/// A backup artifact bound to a claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotRecord {
    pub kind: SnapshotKind,
    pub namespace: String,
    pub name: String,
    /// Name of the claim the snapshot was taken from.
    pub claim: String,
}

impl SnapshotRecord {
    /// Build the composite key for the snapshots table.
    pub fn table_key(&self) -> String {
        snapshot_key(self.kind, &self.namespace, &self.name)
    }
}

pub(crate) fn snapshot_key(kind: SnapshotKind, namespace: &str, name: &str) -> String {
    format!("{}/{}/{}", kind.as_str(), namespace, name)
}

// ── Secrets ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecretRecord {
    pub namespace: String,
    pub name: String,
    pub data: BTreeMap<String, String>,
}

impl SecretRecord {
    pub fn table_key(&self) -> String {
        namespaced_key(&self.namespace, &self.name)
    }
}

// ── Configuration objects ─────────────────────────────────────────

/// A keyed text-blob configuration object.
///
/// `generation` is assigned by the store: 1 on create, bumped on every
/// successful update. Callers send back the generation they read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigObject {
    pub namespace: String,
    pub name: String,
    pub data: BTreeMap<String, String>,
    pub generation: u64,
}

impl ConfigObject {
    /// An empty, not yet stored object.
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            data: BTreeMap::new(),
            generation: 0,
        }
    }

    pub fn table_key(&self) -> String {
        namespaced_key(&self.namespace, &self.name)
    }
}

pub(crate) fn namespaced_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

/// Outcome of a create-or-update call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// The stored object already matched; nothing was written.
    Unchanged,
    Created,
    Updated,
}
