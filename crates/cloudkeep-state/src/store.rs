//! StateStore: redb-backed declarative resource store for cloudkeep.
//!
//! Provides typed get/list/put/delete over namespaces, extension schemas,
//! claims, snapshots, secrets and configuration objects. All values are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).
//!
//! Every mutation is a single write transaction, so a caller that stops
//! between calls never leaves a record half written.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use cloudkeep_core::{ResourceKind, SnapshotKind};

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe resource store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in [NAMESPACES, SCHEMAS, CLAIMS, SNAPSHOTS, SECRETS, CONFIGS] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic record access ──────────────────────────────────────

    fn put<T: Serialize>(&self, table: Table, key: &str, record: &T) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn list_prefix<T: DeserializeOwned>(&self, table: Table, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                let record: T =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    fn remove(&self, table: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Namespaces ─────────────────────────────────────────────────

    /// Insert or update a namespace.
    pub fn put_namespace(&self, ns: &NamespaceRecord) -> StateResult<()> {
        self.put(NAMESPACES, &ns.name, ns)?;
        debug!(namespace = %ns.name, "namespace stored");
        Ok(())
    }

    pub fn get_namespace(&self, name: &str) -> StateResult<Option<NamespaceRecord>> {
        self.get(NAMESPACES, name)
    }

    /// Delete a namespace. Returns true if it existed.
    pub fn delete_namespace(&self, name: &str) -> StateResult<bool> {
        let existed = self.remove(NAMESPACES, name)?;
        debug!(namespace = %name, existed, "namespace deleted");
        Ok(existed)
    }

    // ── Extension schemas ──────────────────────────────────────────

    pub fn put_schema(&self, schema: &SchemaDefinition) -> StateResult<()> {
        self.put(SCHEMAS, &schema.name, schema)
    }

    /// Whether an extension schema with this name is installed.
    pub fn schema_exists(&self, name: &str) -> StateResult<bool> {
        Ok(self.get::<SchemaDefinition>(SCHEMAS, name)?.is_some())
    }

    // ── Claims ─────────────────────────────────────────────────────

    /// Insert or update a resource claim.
    pub fn put_claim(&self, claim: &ResourceClaim) -> StateResult<()> {
        let key = claim.table_key();
        self.put(CLAIMS, &key, claim)?;
        debug!(%key, "claim stored");
        Ok(())
    }

    /// List all claims of one kind in a namespace.
    pub fn list_claims(
        &self,
        kind: ResourceKind,
        namespace: &str,
    ) -> StateResult<Vec<ResourceClaim>> {
        self.list_prefix(CLAIMS, &format!("{}/{}/", kind.as_str(), namespace))
    }

    /// Delete a claim. Returns true if it existed.
    pub fn delete_claim(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> StateResult<bool> {
        let key = claim_key(kind, namespace, name);
        let existed = self.remove(CLAIMS, &key)?;
        debug!(%key, existed, "claim deleted");
        Ok(existed)
    }

    // ── Snapshots ──────────────────────────────────────────────────

    pub fn put_snapshot(&self, snapshot: &SnapshotRecord) -> StateResult<()> {
        self.put(SNAPSHOTS, &snapshot.table_key(), snapshot)
    }

    /// List all snapshots of one kind in a namespace.
    pub fn list_snapshots(
        &self,
        kind: SnapshotKind,
        namespace: &str,
    ) -> StateResult<Vec<SnapshotRecord>> {
        self.list_prefix(SNAPSHOTS, &format!("{}/{}/", kind.as_str(), namespace))
    }

    /// Delete a snapshot. Returns true if it existed.
    pub fn delete_snapshot(
        &self,
        kind: SnapshotKind,
        namespace: &str,
        name: &str,
    ) -> StateResult<bool> {
        let key = snapshot_key(kind, namespace, name);
        let existed = self.remove(SNAPSHOTS, &key)?;
        debug!(%key, existed, "snapshot deleted");
        Ok(existed)
    }

    // ── Secrets ────────────────────────────────────────────────────

    pub fn put_secret(&self, secret: &SecretRecord) -> StateResult<()> {
        self.put(SECRETS, &secret.table_key(), secret)
    }

    pub fn get_secret(&self, namespace: &str, name: &str) -> StateResult<Option<SecretRecord>> {
        self.get(SECRETS, &namespaced_key(namespace, name))
    }

    // ── Configuration objects ──────────────────────────────────────

    pub fn get_config(&self, namespace: &str, name: &str) -> StateResult<Option<ConfigObject>> {
        self.get(CONFIGS, &namespaced_key(namespace, name))
    }

    /// Store a new configuration object at generation 1.
    pub fn create_config(&self, config: &ConfigObject) -> StateResult<ConfigObject> {
        let key = config.table_key();
        let mut stored = config.clone();
        stored.generation = 1;
        let value = serde_json::to_vec(&stored).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CONFIGS).map_err(map_err!(Table))?;
            if table.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::AlreadyExists(key));
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "config object created");
        Ok(stored)
    }

    /// Replace a configuration object if its stored generation still equals
    /// `config.generation`. Returns the stored object with the bumped generation.
    pub fn update_config(&self, config: &ConfigObject) -> StateResult<ConfigObject> {
        let key = config.table_key();
        let mut stored = config.clone();
        stored.generation = config.generation + 1;
        let value = serde_json::to_vec(&stored).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CONFIGS).map_err(map_err!(Table))?;
            let current: ConfigObject = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(key)),
            };
            if current.generation != config.generation {
                return Err(StateError::Conflict {
                    key,
                    expected: config.generation,
                    found: current.generation,
                });
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, generation = stored.generation, "config object updated");
        Ok(stored)
    }

    /// Delete a configuration object. Returns true if it existed.
    pub fn delete_config(&self, namespace: &str, name: &str) -> StateResult<bool> {
        self.remove(CONFIGS, &namespaced_key(namespace, name))
    }
}
