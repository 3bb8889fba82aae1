//! Boundary traits for the collaborators a reconcile pass talks to.
//!
//! The reconciler never touches storage directly; it goes through
//! [`ClusterClient`], which [`StateStore`] implements. Tests wrap a store to
//! record call order or inject failures.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info};

use cloudkeep_core::{ResourceKind, SnapshotKind};
use cloudkeep_state::*;
use cloudkeep_strategy::{StrategyError, StrategyResult};

use crate::error::{ReconcileError, ReconcileResult};

/// Declarative resource store operations used by the reconciler.
pub trait ClusterClient: Send + Sync {
    fn namespace_exists(&self, name: &str) -> StateResult<bool>;
    /// Create the namespace if absent.
    fn ensure_namespace(&self, name: &str) -> StateResult<OperationResult>;
    /// Returns true if the namespace existed.
    fn delete_namespace(&self, name: &str) -> StateResult<bool>;

    fn schema_exists(&self, name: &str) -> StateResult<bool>;

    fn list_snapshots(&self, kind: SnapshotKind, namespace: &str)
    -> StateResult<Vec<SnapshotRecord>>;
    fn delete_snapshot(&self, snapshot: &SnapshotRecord) -> StateResult<bool>;

    fn list_claims(&self, kind: ResourceKind, namespace: &str) -> StateResult<Vec<ResourceClaim>>;
    /// Issue deletion of a claim. Does not wait for the external resource.
    fn delete_claim(&self, claim: &ResourceClaim) -> StateResult<bool>;

    fn get_secret(&self, namespace: &str, name: &str) -> StateResult<Option<SecretRecord>>;

    fn get_config(&self, namespace: &str, name: &str) -> StateResult<Option<ConfigObject>>;
    fn create_config(&self, config: &ConfigObject) -> StateResult<ConfigObject>;
    /// Write-if-match on `config.generation`.
    fn update_config(&self, config: &ConfigObject) -> StateResult<ConfigObject>;
}

impl ClusterClient for StateStore {
    fn namespace_exists(&self, name: &str) -> StateResult<bool> {
        Ok(self.get_namespace(name)?.is_some())
    }

    fn ensure_namespace(&self, name: &str) -> StateResult<OperationResult> {
        if self.get_namespace(name)?.is_some() {
            return Ok(OperationResult::Unchanged);
        }
        self.put_namespace(&NamespaceRecord {
            name: name.to_string(),
            labels: BTreeMap::new(),
            created_at: epoch_secs(),
        })?;
        Ok(OperationResult::Created)
    }

    fn delete_namespace(&self, name: &str) -> StateResult<bool> {
        StateStore::delete_namespace(self, name)
    }

    fn schema_exists(&self, name: &str) -> StateResult<bool> {
        StateStore::schema_exists(self, name)
    }

    fn list_snapshots(
        &self,
        kind: SnapshotKind,
        namespace: &str,
    ) -> StateResult<Vec<SnapshotRecord>> {
        StateStore::list_snapshots(self, kind, namespace)
    }

    fn delete_snapshot(&self, snapshot: &SnapshotRecord) -> StateResult<bool> {
        StateStore::delete_snapshot(self, snapshot.kind, &snapshot.namespace, &snapshot.name)
    }

    fn list_claims(&self, kind: ResourceKind, namespace: &str) -> StateResult<Vec<ResourceClaim>> {
        StateStore::list_claims(self, kind, namespace)
    }

    fn delete_claim(&self, claim: &ResourceClaim) -> StateResult<bool> {
        StateStore::delete_claim(self, claim.kind, &claim.namespace, &claim.name)
    }

    fn get_secret(&self, namespace: &str, name: &str) -> StateResult<Option<SecretRecord>> {
        StateStore::get_secret(self, namespace, name)
    }

    fn get_config(&self, namespace: &str, name: &str) -> StateResult<Option<ConfigObject>> {
        StateStore::get_config(self, namespace, name)
    }

    fn create_config(&self, config: &ConfigObject) -> StateResult<ConfigObject> {
        StateStore::create_config(self, config)
    }

    fn update_config(&self, config: &ConfigObject) -> StateResult<ConfigObject> {
        StateStore::update_config(self, config)
    }
}

/// Read the configuration object (or start from an empty one), apply
/// `mutate` to its data, and write it back only if the data changed.
///
/// A mutation error aborts before anything is written. The update carries
/// the generation that was read, so a concurrent writer in between makes
/// this call fail with a conflict instead of losing that writer's change.
pub fn create_or_update_config<F>(
    client: &dyn ClusterClient,
    namespace: &str,
    name: &str,
    mutate: F,
) -> ReconcileResult<OperationResult>
where
    F: FnOnce(&mut BTreeMap<String, String>) -> StrategyResult<()>,
{
    match read_config(client, namespace, name)? {
        None => {
            let mut config = ConfigObject::new(namespace, name);
            mutate(&mut config.data).map_err(|e| strategy_err(namespace, name, e))?;
            client
                .create_config(&config)
                .map_err(|e| ReconcileError::store("create", "config object", namespace, e))?;
            debug!(%namespace, %name, "config object created");
            Ok(OperationResult::Created)
        }
        Some(current) => write_if_changed(client, current, mutate),
    }
}

/// Like [`create_or_update_config`], but never creates the object.
///
/// Returns `None` without calling `mutate` when the object is absent.
pub fn update_existing_config<F>(
    client: &dyn ClusterClient,
    namespace: &str,
    name: &str,
    mutate: F,
) -> ReconcileResult<Option<OperationResult>>
where
    F: FnOnce(&mut BTreeMap<String, String>) -> StrategyResult<()>,
{
    match read_config(client, namespace, name)? {
        None => Ok(None),
        Some(current) => write_if_changed(client, current, mutate).map(Some),
    }
}

fn read_config(
    client: &dyn ClusterClient,
    namespace: &str,
    name: &str,
) -> ReconcileResult<Option<ConfigObject>> {
    client
        .get_config(namespace, name)
        .map_err(|e| ReconcileError::store("get", "config object", namespace, e))
}

fn strategy_err(
    namespace: &str,
    name: &str,
    source: StrategyError,
) -> ReconcileError {
    ReconcileError::Strategy {
        namespace: namespace.to_string(),
        name: name.to_string(),
        source,
    }
}

fn write_if_changed<F>(
    client: &dyn ClusterClient,
    current: ConfigObject,
    mutate: F,
) -> ReconcileResult<OperationResult>
where
    F: FnOnce(&mut BTreeMap<String, String>) -> StrategyResult<()>,
{
    let namespace = current.namespace.as_str();
    let name = current.name.as_str();
    let mut config = current.clone();
    mutate(&mut config.data).map_err(|e| strategy_err(namespace, name, e))?;
    if config.data == current.data {
        return Ok(OperationResult::Unchanged);
    }
    let stored = client
        .update_config(&config)
        .map_err(|e| ReconcileError::store("update", "config object", namespace, e))?;
    debug!(%namespace, %name, generation = stored.generation, "config object updated");
    Ok(OperationResult::Updated)
}

/// Source of externally supplied installation parameters.
pub trait ParameterSource: Send + Sync {
    /// `Ok(None)` when the parameter is not present.
    fn get_string_parameter(&self, namespace: &str, key: &str) -> StateResult<Option<String>>;
}

/// Reads parameters from a secret in the installation namespace.
pub struct SecretParameterSource {
    client: Arc<dyn ClusterClient>,
    secret_name: String,
}

impl SecretParameterSource {
    pub const DEFAULT_SECRET: &'static str = "addon-managed-api-service-parameters";

    pub fn new(client: Arc<dyn ClusterClient>, secret_name: &str) -> Self {
        Self {
            client,
            secret_name: secret_name.to_string(),
        }
    }
}

impl ParameterSource for SecretParameterSource {
    fn get_string_parameter(&self, namespace: &str, key: &str) -> StateResult<Option<String>> {
        Ok(self
            .client
            .get_secret(namespace, &self.secret_name)?
            .and_then(|secret| secret.data.get(key).cloned()))
    }
}

/// Receives reconcile outcomes. Fire-and-forget: nothing it does feeds
/// back into the pass.
pub trait Notifier: Send + Sync {
    fn report_failure(&self, step: &str, message: &str, error: &ReconcileError);
    fn report_complete(&self, product: &str);
}

/// Notifier that emits structured log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn report_failure(&self, step: &str, message: &str, error: &ReconcileError) {
        error!(%step, error = %error, "{message}");
    }

    fn report_complete(&self, product: &str) {
        info!(%product, "product reconciled");
    }
}

/// Current unix time in seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
