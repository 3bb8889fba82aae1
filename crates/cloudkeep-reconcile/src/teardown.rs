//! Teardown orchestrator: ordered, resumable decommission of an
//! installation's cloud resources.
//!
//! ```text
//! NotStarted ──(claim schema absent)────────────────────────► Done
//!     │ snapshots deleted
//!     ▼
//! SnapshotsRemoved
//!     │ destructive delete strategies written (skipped on cluster storage)
//!     ▼
//! StrategyOverridden
//!     │ delete issued for every claim
//!     ▼
//! ClaimsDeleting ──(every enumeration empty)────────────────► Done
//! ```
//!
//! Deletes are issued but never awaited. A pass that still saw claims
//! reports `InProgress`; the pass that observes all three kinds empty is
//! the one that reports `Completed`.

use tracing::{debug, info};

use cloudkeep_core::{CLAIM_SCHEMA, Installation, ResourceKind, SNAPSHOT_SCHEMA, SnapshotKind};
use cloudkeep_strategy::StrategyConfig;

use crate::cancel::Cancellation;
use crate::client::{ClusterClient, update_existing_config};
use crate::error::{ReconcileError, ReconcileResult};
use crate::phase::Phase;

/// How far the current invocation has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TeardownStage {
    NotStarted,
    /// Every snapshot delete has been issued.
    SnapshotsRemoved,
    /// Delete strategies are destructive (or cluster storage needs none).
    StrategyOverridden,
    /// Claim deletes issued; waiting for the enumerations to drain.
    ClaimsDeleting,
    Done,
}

/// Claims seen per kind when deletes were issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimCounts {
    pub postgres: usize,
    pub redis: usize,
    pub blobstorage: usize,
}

impl ClaimCounts {
    pub fn total(&self) -> usize {
        self.postgres + self.redis + self.blobstorage
    }

    fn record(&mut self, kind: ResourceKind, count: usize) {
        match kind {
            ResourceKind::Postgres => self.postgres = count,
            ResourceKind::Redis => self.redis = count,
            ResourceKind::BlobStorage => self.blobstorage = count,
        }
    }
}

/// One invocation of the teardown sequence for an installation.
pub struct Teardown<'a> {
    client: &'a dyn ClusterClient,
    installation: &'a Installation,
    strategies_config: &'a str,
    cancel: &'a Cancellation,
    stage: TeardownStage,
    claims: ClaimCounts,
    snapshots_deleted: usize,
}

impl<'a> Teardown<'a> {
    pub fn new(
        client: &'a dyn ClusterClient,
        installation: &'a Installation,
        strategies_config: &'a str,
        cancel: &'a Cancellation,
    ) -> Self {
        Self {
            client,
            installation,
            strategies_config,
            cancel,
            stage: TeardownStage::NotStarted,
            claims: ClaimCounts::default(),
            snapshots_deleted: 0,
        }
    }

    pub fn stage(&self) -> TeardownStage {
        self.stage
    }

    pub fn claims(&self) -> ClaimCounts {
        self.claims
    }

    pub fn snapshots_deleted(&self) -> usize {
        self.snapshots_deleted
    }

    /// Advance through every stage this invocation can reach.
    pub fn run(&mut self) -> ReconcileResult<Phase> {
        loop {
            if let Some(phase) = self.advance()? {
                return Ok(phase);
            }
        }
    }

    /// Do the current stage's work and move to the next stage.
    ///
    /// Returns `Some(phase)` once this invocation has gone as far as it can.
    pub fn advance(&mut self) -> ReconcileResult<Option<Phase>> {
        let namespace = self.installation.namespace.as_str();
        match self.stage {
            TeardownStage::NotStarted => {
                if !self.schema_exists(CLAIM_SCHEMA)? {
                    info!(%namespace, schema = CLAIM_SCHEMA, "claim schema absent, nothing to tear down");
                    self.stage = TeardownStage::Done;
                    return Ok(Some(Phase::Completed));
                }
                self.remove_snapshots()?;
                self.stage = TeardownStage::SnapshotsRemoved;
                Ok(None)
            }

            TeardownStage::SnapshotsRemoved => {
                if self.installation.use_cluster_storage {
                    debug!(%namespace, "cluster storage in use, keeping delete strategies");
                } else {
                    self.override_delete_strategies()?;
                }
                self.stage = TeardownStage::StrategyOverridden;
                Ok(None)
            }

            TeardownStage::StrategyOverridden => {
                self.delete_claims()?;
                self.stage = TeardownStage::ClaimsDeleting;
                Ok(None)
            }

            TeardownStage::ClaimsDeleting => {
                let claims = self.claims;
                if claims.total() > 0 {
                    info!(
                        %namespace,
                        postgres = claims.postgres,
                        redis = claims.redis,
                        blobstorage = claims.blobstorage,
                        "waiting for cloud resources to be removed"
                    );
                    return Ok(Some(Phase::InProgress));
                }
                info!(%namespace, "all cloud resources removed");
                self.stage = TeardownStage::Done;
                Ok(Some(Phase::Completed))
            }

            TeardownStage::Done => Ok(Some(Phase::Completed)),
        }
    }

    fn schema_exists(&self, schema: &str) -> ReconcileResult<bool> {
        self.cancel.check()?;
        self.client
            .schema_exists(schema)
            .map_err(|e| ReconcileError::store("look up", schema, &self.installation.namespace, e))
    }

    fn remove_snapshots(&mut self) -> ReconcileResult<()> {
        let namespace = self.installation.namespace.as_str();
        if !self.schema_exists(SNAPSHOT_SCHEMA)? {
            debug!(%namespace, "snapshot schema absent, no snapshots to remove");
            return Ok(());
        }

        for kind in SnapshotKind::ALL {
            self.cancel.check()?;
            let snapshots = self
                .client
                .list_snapshots(kind, namespace)
                .map_err(|e| ReconcileError::store("list", kind.as_str(), namespace, e))?;
            for snapshot in &snapshots {
                self.cancel.check()?;
                self.client
                    .delete_snapshot(snapshot)
                    .map_err(|e| ReconcileError::store("delete", kind.as_str(), namespace, e))?;
                debug!(%namespace, %kind, name = %snapshot.name, "snapshot delete issued");
            }
            self.snapshots_deleted += snapshots.len();
        }

        info!(%namespace, count = self.snapshots_deleted, "snapshots removed");
        Ok(())
    }

    fn override_delete_strategies(&self) -> ReconcileResult<()> {
        self.cancel.check()?;
        let namespace = self.installation.namespace.as_str();
        let outcome = update_existing_config(
            self.client,
            namespace,
            self.strategies_config,
            |data| StrategyConfig::new(data).override_delete_strategies(),
        )?;
        match outcome {
            Some(outcome) => info!(
                %namespace,
                name = %self.strategies_config,
                outcome = ?outcome,
                "destructive delete strategies in place"
            ),
            None => debug!(
                %namespace,
                name = %self.strategies_config,
                "no strategy configuration, nothing to override"
            ),
        }
        Ok(())
    }

    fn delete_claims(&mut self) -> ReconcileResult<()> {
        let namespace = self.installation.namespace.as_str();
        for kind in ResourceKind::ALL {
            self.cancel.check()?;
            let claims = self
                .client
                .list_claims(kind, namespace)
                .map_err(|e| ReconcileError::store("list", kind.as_str(), namespace, e))?;
            for claim in &claims {
                self.cancel.check()?;
                self.client
                    .delete_claim(claim)
                    .map_err(|e| ReconcileError::store("delete", kind.as_str(), namespace, e))?;
                debug!(%namespace, %kind, name = %claim.name, "claim delete issued");
            }
            self.claims.record(kind, claims.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudkeep_state::*;
    use std::collections::BTreeMap;

    const CONFIG: &str = "cloud-resources-aws-strategies";

    fn installation(use_cluster_storage: bool) -> Installation {
        Installation {
            name: "rhmi".to_string(),
            namespace: "rhmi-operator".to_string(),
            namespace_prefix: "rhmi-".to_string(),
            created_at: 0,
            use_cluster_storage,
            operators_in_product_namespace: false,
            sts: false,
        }
    }

    fn schema(store: &StateStore, name: &str) {
        store
            .put_schema(&SchemaDefinition {
                name: name.to_string(),
            })
            .unwrap();
    }

    fn claim(store: &StateStore, kind: ResourceKind, name: &str) {
        store
            .put_claim(&ResourceClaim {
                kind,
                namespace: "rhmi-operator".to_string(),
                name: name.to_string(),
                tier: "production".to_string(),
            })
            .unwrap();
    }

    fn snapshot(store: &StateStore, kind: SnapshotKind, name: &str) {
        store
            .put_snapshot(&SnapshotRecord {
                kind,
                namespace: "rhmi-operator".to_string(),
                name: name.to_string(),
                claim: "db".to_string(),
            })
            .unwrap();
    }

    fn seed_strategies(store: &StateStore) {
        let mut config = ConfigObject::new("rhmi-operator", CONFIG);
        config.data = BTreeMap::from([
            ("postgres".to_string(), r#"{"production":{"deleteStrategy":{}}}"#.to_string()),
            ("redis".to_string(), r#"{"production":{"deleteStrategy":{}}}"#.to_string()),
            ("blobstorage".to_string(), r#"{"production":{"deleteStrategy":{}}}"#.to_string()),
        ]);
        store.create_config(&config).unwrap();
    }

    #[test]
    fn absent_schema_completes_without_deletes() {
        let store = StateStore::open_in_memory().unwrap();
        claim(&store, ResourceKind::Redis, "cache");
        let inst = installation(false);
        let cancel = Cancellation::never();

        let mut teardown = Teardown::new(&store, &inst, CONFIG, &cancel);
        assert_eq!(teardown.run().unwrap(), Phase::Completed);
        assert_eq!(teardown.stage(), TeardownStage::Done);
        assert_eq!(store.list_claims(ResourceKind::Redis, "rhmi-operator").unwrap().len(), 1);
        assert!(store.get_config("rhmi-operator", CONFIG).unwrap().is_none());
    }

    #[test]
    fn stages_advance_in_order() {
        let store = StateStore::open_in_memory().unwrap();
        schema(&store, "postgres.integreatly.org");
        seed_strategies(&store);
        claim(&store, ResourceKind::Postgres, "db");
        let inst = installation(false);
        let cancel = Cancellation::never();

        let mut teardown = Teardown::new(&store, &inst, CONFIG, &cancel);
        let mut stages = vec![teardown.stage()];
        let phase = loop {
            if let Some(phase) = teardown.advance().unwrap() {
                break phase;
            }
            stages.push(teardown.stage());
        };
        assert_eq!(
            stages,
            vec![
                TeardownStage::NotStarted,
                TeardownStage::SnapshotsRemoved,
                TeardownStage::StrategyOverridden,
                TeardownStage::ClaimsDeleting,
            ]
        );
        assert_eq!(phase, Phase::InProgress);
        assert_eq!(teardown.claims().postgres, 1);
    }

    #[test]
    fn deletes_snapshots_then_claims_and_overrides_strategies() {
        let store = StateStore::open_in_memory().unwrap();
        schema(&store, "postgres.integreatly.org");
        schema(&store, "postgressnapshots.integreatly.org");
        seed_strategies(&store);
        snapshot(&store, SnapshotKind::Postgres, "pg-snap");
        snapshot(&store, SnapshotKind::Redis, "redis-snap");
        claim(&store, ResourceKind::Postgres, "db");
        claim(&store, ResourceKind::BlobStorage, "bucket");
        let inst = installation(false);
        let cancel = Cancellation::never();

        let mut teardown = Teardown::new(&store, &inst, CONFIG, &cancel);
        assert_eq!(teardown.run().unwrap(), Phase::InProgress);
        assert_eq!(teardown.snapshots_deleted(), 2);
        assert_eq!(
            teardown.claims(),
            ClaimCounts {
                postgres: 1,
                redis: 0,
                blobstorage: 1
            }
        );
        for kind in SnapshotKind::ALL {
            assert!(store.list_snapshots(kind, "rhmi-operator").unwrap().is_empty());
        }

        let config = store.get_config("rhmi-operator", CONFIG).unwrap().unwrap();
        assert_eq!(
            config.data["postgres"],
            r#"{"production":{"deleteStrategy":{"SkipFinalSnapshot":true}}}"#
        );
        assert_eq!(
            config.data["blobstorage"],
            r#"{"production":{"deleteStrategy":{"forceBucketDeletion":true}}}"#
        );

        // Claims are gone now; the next invocation observes that and completes.
        let mut again = Teardown::new(&store, &inst, CONFIG, &cancel);
        assert_eq!(again.run().unwrap(), Phase::Completed);
        assert_eq!(again.stage(), TeardownStage::Done);
    }

    #[test]
    fn cluster_storage_skips_strategy_override() {
        let store = StateStore::open_in_memory().unwrap();
        schema(&store, "postgres.integreatly.org");
        seed_strategies(&store);
        let before = store.get_config("rhmi-operator", CONFIG).unwrap().unwrap();
        let inst = installation(true);
        let cancel = Cancellation::never();

        let mut teardown = Teardown::new(&store, &inst, CONFIG, &cancel);
        assert_eq!(teardown.run().unwrap(), Phase::Completed);
        let after = store.get_config("rhmi-operator", CONFIG).unwrap().unwrap();
        assert_eq!(after, before);
    }

    #[test]
    fn absent_strategy_config_stays_absent() {
        let store = StateStore::open_in_memory().unwrap();
        schema(&store, "postgres.integreatly.org");
        claim(&store, ResourceKind::Redis, "cache");
        let inst = installation(false);
        let cancel = Cancellation::never();

        let mut teardown = Teardown::new(&store, &inst, CONFIG, &cancel);
        assert_eq!(teardown.run().unwrap(), Phase::InProgress);
        assert_eq!(teardown.claims().redis, 1);
        assert!(store.get_config("rhmi-operator", CONFIG).unwrap().is_none());
    }

    #[test]
    fn malformed_strategy_fails_before_any_claim_delete() {
        let store = StateStore::open_in_memory().unwrap();
        schema(&store, "postgres.integreatly.org");
        let mut config = ConfigObject::new("rhmi-operator", CONFIG);
        config.data.insert("redis".to_string(), "not json".to_string());
        store.create_config(&config).unwrap();
        claim(&store, ResourceKind::Redis, "cache");
        let inst = installation(false);
        let cancel = Cancellation::never();

        let mut teardown = Teardown::new(&store, &inst, CONFIG, &cancel);
        let err = teardown.run().unwrap_err();
        assert!(matches!(err, ReconcileError::Strategy { .. }));
        assert_eq!(teardown.stage(), TeardownStage::SnapshotsRemoved);
        assert_eq!(store.list_claims(ResourceKind::Redis, "rhmi-operator").unwrap().len(), 1);
    }

    #[test]
    fn cancelled_before_first_boundary_call() {
        let store = StateStore::open_in_memory().unwrap();
        schema(&store, "postgres.integreatly.org");
        claim(&store, ResourceKind::Postgres, "db");
        let (tx, rx) = tokio::sync::watch::channel(true);
        let cancel = Cancellation::new(rx);
        let inst = installation(false);

        let mut teardown = Teardown::new(&store, &inst, CONFIG, &cancel);
        assert!(matches!(teardown.run(), Err(ReconcileError::Cancelled)));
        assert_eq!(teardown.stage(), TeardownStage::NotStarted);
        assert_eq!(store.list_claims(ResourceKind::Postgres, "rhmi-operator").unwrap().len(), 1);
        drop(tx);
    }
}
