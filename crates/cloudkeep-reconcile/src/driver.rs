//! Phase convergence driver.
//!
//! A pass runs the install steps (or the uninstall sequence) in order and
//! returns the first result that is not `Completed`. The driver never
//! retries or waits: `InProgress` asks the caller to invoke it again later,
//! and a step error is reported to the notifier and returned as `Failed`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use cloudkeep_core::{Installation, KeeperConfig, ResourceKind};
use cloudkeep_strategy::StrategyTimeConfig;

use crate::cancel::Cancellation;
use crate::client::{ClusterClient, Notifier, ParameterSource, epoch_secs};
use crate::error::{ReconcileError, ReconcileResult};
use crate::install::InstallSteps;
use crate::phase::Phase;
use crate::teardown::Teardown;

/// Values resolved from [`KeeperConfig`] once, at startup.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub operator_namespace: String,
    pub strategies_config: String,
    pub times: StrategyTimeConfig,
    pub redis_service_updates: Vec<String>,
    pub postgres_service_updates: Vec<String>,
    pub grace_window: Duration,
    pub cidr_parameter: String,
}

impl ReconcilerSettings {
    pub fn from_config(config: &KeeperConfig) -> Self {
        Self {
            operator_namespace: config.operator_namespace(),
            strategies_config: config.strategies_config_name(),
            times: StrategyTimeConfig {
                backup_start_time: config.strategies.backup_start_time.clone(),
                maintenance_start_time: config.strategies.maintenance_start_time.clone(),
            },
            redis_service_updates: config.service_updates.redis.clone(),
            postgres_service_updates: config.service_updates.postgres.clone(),
            grace_window: config.reconcile.grace_window(),
            cidr_parameter: config.reconcile.cidr_parameter.clone(),
        }
    }
}

/// Drives an installation's cloud resources toward installed or removed.
pub struct Reconciler {
    client: Arc<dyn ClusterClient>,
    parameters: Arc<dyn ParameterSource>,
    notifier: Arc<dyn Notifier>,
    settings: ReconcilerSettings,
}

impl Reconciler {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        parameters: Arc<dyn ParameterSource>,
        notifier: Arc<dyn Notifier>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            client,
            parameters,
            notifier,
            settings,
        }
    }

    /// Run one pass at the current wall-clock time.
    pub fn reconcile(
        &self,
        installation: &Installation,
        uninstall: bool,
        cancel: &Cancellation,
    ) -> Phase {
        self.reconcile_at(installation, uninstall, cancel, epoch_secs())
    }

    /// Run one pass treating `now` (unix seconds) as the current time.
    pub fn reconcile_at(
        &self,
        installation: &Installation,
        uninstall: bool,
        cancel: &Cancellation,
        now: u64,
    ) -> Phase {
        let phase = if uninstall {
            self.step("uninstall", || self.uninstall(installation, cancel))
        } else {
            self.install(installation, cancel, now)
        };
        info!(
            installation = %installation.name,
            uninstall,
            phase = %phase,
            "reconcile pass finished"
        );
        phase
    }

    fn install(&self, installation: &Installation, cancel: &Cancellation, now: u64) -> Phase {
        let steps = InstallSteps {
            client: self.client.as_ref(),
            parameters: self.parameters.as_ref(),
            settings: &self.settings,
            installation,
            cancel,
            now,
        };
        let redis = &self.settings.redis_service_updates;
        let postgres = &self.settings.postgres_service_updates;

        let plan: [(&str, &dyn Fn() -> ReconcileResult<Phase>); 6] = [
            ("namespace", &|| steps.ensure_namespace()),
            ("sts-credentials", &|| steps.check_sts_credentials()),
            ("network-cidr", &|| steps.reconcile_cidr()),
            ("strategy-defaults", &|| steps.reconcile_strategy_defaults()),
            ("service-updates/redis", &|| {
                steps.reconcile_service_updates(ResourceKind::Redis, redis)
            }),
            ("service-updates/postgres", &|| {
                steps.reconcile_service_updates(ResourceKind::Postgres, postgres)
            }),
        ];

        let phase = Phase::first_incomplete(
            plan.into_iter()
                .map(|(name, run)| move || self.step(name, run)),
        );
        if phase.is_completed() {
            self.notifier.report_complete(&installation.name);
        }
        phase
    }

    fn uninstall(
        &self,
        installation: &Installation,
        cancel: &Cancellation,
    ) -> ReconcileResult<Phase> {
        let namespace = self.settings.operator_namespace.as_str();

        cancel.check()?;
        let exists = self
            .client
            .namespace_exists(namespace)
            .map_err(|e| ReconcileError::store("get", "namespace", namespace, e))?;
        if !exists {
            debug!(%namespace, "operator namespace already removed");
            return Ok(Phase::Completed);
        }

        let mut teardown = Teardown::new(
            self.client.as_ref(),
            installation,
            &self.settings.strategies_config,
            cancel,
        );
        let phase = teardown.run()?;
        if !phase.is_completed() {
            return Ok(phase);
        }

        cancel.check()?;
        let existed = self
            .client
            .delete_namespace(namespace)
            .map_err(|e| ReconcileError::store("delete", "namespace", namespace, e))?;
        if existed {
            info!(%namespace, "operator namespace deletion issued");
            return Ok(Phase::InProgress);
        }
        Ok(Phase::Completed)
    }

    /// Run one named step, turning an error into a reported `Failed`.
    fn step(&self, name: &str, run: impl FnOnce() -> ReconcileResult<Phase>) -> Phase {
        match run() {
            Ok(phase) => {
                debug!(step = %name, phase = %phase, "step finished");
                phase
            }
            Err(err) => {
                self.notifier
                    .report_failure(name, &format!("failed to reconcile {name}"), &err);
                Phase::failed(name, &err)
            }
        }
    }
}
