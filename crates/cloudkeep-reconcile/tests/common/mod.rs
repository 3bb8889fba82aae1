//! Shared fixtures for reconciler integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use cloudkeep_core::{Installation, KeeperConfig, ResourceKind, SnapshotKind};
use cloudkeep_reconcile::*;
use cloudkeep_state::*;

pub const NAMESPACE: &str = "rhmi-operator";
pub const CONFIG: &str = "cloud-resources-aws-strategies";

/// Store wrapper that logs every boundary call and can fail or defer some.
pub struct RecordingClient {
    inner: StateStore,
    ops: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
    defer_claim_deletes: Mutex<bool>,
    pending_claims: Mutex<Vec<ResourceClaim>>,
}

impl RecordingClient {
    pub fn new(inner: StateStore) -> Self {
        Self {
            inner,
            ops: Mutex::new(Vec::new()),
            fail_on: Mutex::new(None),
            defer_claim_deletes: Mutex::new(false),
            pending_claims: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.inner
    }

    /// Operations recorded so far, e.g. `delete_claim postgres/db-1`.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    /// Index of the first recorded op starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.ops().iter().position(|op| op.starts_with(prefix))
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.ops().iter().filter(|op| op.starts_with(prefix)).count()
    }

    /// Fail every op whose log line starts with `prefix`.
    pub fn fail_on(&self, prefix: &str) {
        *self.fail_on.lock().unwrap() = Some(prefix.to_string());
    }

    /// Accept claim deletes without removing the claims until [`settle`](Self::settle).
    pub fn defer_claim_deletes(&self) {
        *self.defer_claim_deletes.lock().unwrap() = true;
    }

    /// Let the provider finish every accepted claim delete.
    pub fn settle(&self) {
        for claim in self.pending_claims.lock().unwrap().drain(..) {
            self.inner
                .delete_claim(claim.kind, &claim.namespace, &claim.name)
                .unwrap();
        }
    }

    fn record(&self, op: String) -> StateResult<()> {
        let failing = self
            .fail_on
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|prefix| op.starts_with(prefix.as_str()));
        self.ops.lock().unwrap().push(op.clone());
        if failing {
            return Err(StateError::Write(format!("injected failure on {op}")));
        }
        Ok(())
    }
}

impl ClusterClient for RecordingClient {
    fn namespace_exists(&self, name: &str) -> StateResult<bool> {
        self.record(format!("namespace_exists {name}"))?;
        self.inner.namespace_exists(name)
    }

    fn ensure_namespace(&self, name: &str) -> StateResult<OperationResult> {
        self.record(format!("ensure_namespace {name}"))?;
        self.inner.ensure_namespace(name)
    }

    fn delete_namespace(&self, name: &str) -> StateResult<bool> {
        self.record(format!("delete_namespace {name}"))?;
        self.inner.delete_namespace(name)
    }

    fn schema_exists(&self, name: &str) -> StateResult<bool> {
        self.record(format!("schema_exists {name}"))?;
        self.inner.schema_exists(name)
    }

    fn list_snapshots(
        &self,
        kind: SnapshotKind,
        namespace: &str,
    ) -> StateResult<Vec<SnapshotRecord>> {
        self.record(format!("list_snapshots {kind}"))?;
        self.inner.list_snapshots(kind, namespace)
    }

    fn delete_snapshot(&self, snapshot: &SnapshotRecord) -> StateResult<bool> {
        self.record(format!("delete_snapshot {}/{}", snapshot.kind, snapshot.name))?;
        self.inner
            .delete_snapshot(snapshot.kind, &snapshot.namespace, &snapshot.name)
    }

    fn list_claims(&self, kind: ResourceKind, namespace: &str) -> StateResult<Vec<ResourceClaim>> {
        self.record(format!("list_claims {kind}"))?;
        self.inner.list_claims(kind, namespace)
    }

    fn delete_claim(&self, claim: &ResourceClaim) -> StateResult<bool> {
        self.record(format!("delete_claim {}/{}", claim.kind, claim.name))?;
        if *self.defer_claim_deletes.lock().unwrap() {
            self.pending_claims.lock().unwrap().push(claim.clone());
            return Ok(true);
        }
        self.inner.delete_claim(claim.kind, &claim.namespace, &claim.name)
    }

    fn get_secret(&self, namespace: &str, name: &str) -> StateResult<Option<SecretRecord>> {
        self.record(format!("get_secret {name}"))?;
        self.inner.get_secret(namespace, name)
    }

    fn get_config(&self, namespace: &str, name: &str) -> StateResult<Option<ConfigObject>> {
        self.record(format!("get_config {name}"))?;
        self.inner.get_config(namespace, name)
    }

    fn create_config(&self, config: &ConfigObject) -> StateResult<ConfigObject> {
        self.record(format!("create_config {}", config.name))?;
        self.inner.create_config(config)
    }

    fn update_config(&self, config: &ConfigObject) -> StateResult<ConfigObject> {
        self.record(format!("update_config {}", config.name))?;
        self.inner.update_config(config)
    }
}

/// Notifier that keeps what it was told.
#[derive(Default)]
pub struct RecordingNotifier {
    pub failures: Mutex<Vec<(String, String)>>,
    pub completed: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn report_failure(&self, step: &str, _message: &str, error: &ReconcileError) {
        self.failures
            .lock()
            .unwrap()
            .push((step.to_string(), error.to_string()));
    }

    fn report_complete(&self, product: &str) {
        self.completed.lock().unwrap().push(product.to_string());
    }
}

pub fn config(use_cluster_storage: bool, created_at: u64) -> KeeperConfig {
    let mut config = KeeperConfig::scaffold("rhmi", "rhmi-", created_at);
    config.installation.use_cluster_storage = use_cluster_storage;
    config
}

pub fn installation(use_cluster_storage: bool) -> Installation {
    config(use_cluster_storage, 0).installation
}

pub fn put_schema(store: &StateStore, name: &str) {
    store
        .put_schema(&SchemaDefinition {
            name: name.to_string(),
        })
        .unwrap();
}

pub fn put_claim(store: &StateStore, kind: ResourceKind, name: &str) {
    store
        .put_claim(&ResourceClaim {
            kind,
            namespace: NAMESPACE.to_string(),
            name: name.to_string(),
            tier: "production".to_string(),
        })
        .unwrap();
}

pub fn put_snapshot(store: &StateStore, kind: SnapshotKind, name: &str) {
    store
        .put_snapshot(&SnapshotRecord {
            kind,
            namespace: NAMESPACE.to_string(),
            name: name.to_string(),
            claim: "db".to_string(),
        })
        .unwrap();
}

/// Strategy config with one production tier per kind, plus an extra
/// development tier and an unknown field to check preservation.
pub fn put_strategies(store: &StateStore) {
    let mut config = ConfigObject::new(NAMESPACE, CONFIG);
    config.data = BTreeMap::from([
        (
            "postgres".to_string(),
            r#"{"development":{"deleteStrategy":{}},"production":{"createStrategy":{"MultiAZ":true},"deleteStrategy":{},"serviceUpdates":[]}}"#
                .to_string(),
        ),
        (
            "redis".to_string(),
            r#"{"production":{"createStrategy":{},"deleteStrategy":{},"serviceUpdates":["elasticache-20210615-002"]}}"#
                .to_string(),
        ),
        (
            "blobstorage".to_string(),
            r#"{"production":{"createStrategy":{},"deleteStrategy":{},"x-custom":{"keep":1}}}"#
                .to_string(),
        ),
    ]);
    store.create_config(&config).unwrap();
}

pub fn strategy(store: &StateStore, key: &str) -> String {
    store
        .get_config(NAMESPACE, CONFIG)
        .unwrap()
        .and_then(|config| config.data.get(key).cloned())
        .unwrap_or_default()
}
