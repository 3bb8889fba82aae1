//! Install steps run by the driver, in order, until one is not complete.

use tracing::{debug, info};

use cloudkeep_core::{Installation, ResourceKind, TIER_PRODUCTION};
use cloudkeep_state::OperationResult;
use cloudkeep_strategy::defaults::ensure_default_tier;
use cloudkeep_strategy::{CidrOutcome, StrategyConfig, propagate_cidr, set_service_updates};

use crate::cancel::Cancellation;
use crate::client::{ClusterClient, ParameterSource, create_or_update_config};
use crate::driver::ReconcilerSettings;
use crate::error::{ReconcileError, ReconcileResult};
use crate::phase::Phase;

/// Secret that must exist in the operator namespace in short-lived-credential mode.
pub const STS_CREDENTIALS_SECRET: &str = "sts-credentials";

/// Everything an install step needs for one pass.
pub(crate) struct InstallSteps<'a> {
    pub client: &'a dyn ClusterClient,
    pub parameters: &'a dyn ParameterSource,
    pub settings: &'a ReconcilerSettings,
    pub installation: &'a Installation,
    pub cancel: &'a Cancellation,
    /// Unix seconds the pass treats as the current time.
    pub now: u64,
}

impl InstallSteps<'_> {
    /// Create the operator namespace if it does not exist.
    pub fn ensure_namespace(&self) -> ReconcileResult<Phase> {
        self.cancel.check()?;
        let namespace = self.settings.operator_namespace.as_str();
        let outcome = self
            .client
            .ensure_namespace(namespace)
            .map_err(|e| ReconcileError::store("create", "namespace", namespace, e))?;
        if outcome == OperationResult::Created {
            info!(%namespace, "operator namespace created");
        }
        Ok(Phase::Completed)
    }

    /// In STS mode the credentials secret has to be provided up front.
    pub fn check_sts_credentials(&self) -> ReconcileResult<Phase> {
        if !self.installation.sts {
            return Ok(Phase::Completed);
        }
        self.cancel.check()?;
        let namespace = self.settings.operator_namespace.as_str();
        let secret = self
            .client
            .get_secret(namespace, STS_CREDENTIALS_SECRET)
            .map_err(|e| ReconcileError::store("get", "secret", namespace, e))?;
        if secret.is_none() {
            return Err(ReconcileError::MissingCredentials {
                namespace: namespace.to_string(),
                name: STS_CREDENTIALS_SECRET.to_string(),
            });
        }
        Ok(Phase::Completed)
    }

    /// Propagate the network range parameter into the `_network` document once.
    pub fn reconcile_cidr(&self) -> ReconcileResult<Phase> {
        let namespace = self.installation.namespace.as_str();
        let name = self.settings.strategies_config.as_str();

        self.cancel.check()?;
        let exists = self
            .client
            .get_config(namespace, name)
            .map_err(|e| ReconcileError::store("get", "config object", namespace, e))?
            .is_some();
        if !exists {
            debug!(%namespace, %name, "strategy config not created yet, skipping network range");
            return Ok(Phase::Completed);
        }

        self.cancel.check()?;
        let key = self.settings.cidr_parameter.as_str();
        let parameter = self
            .parameters
            .get_string_parameter(namespace, key)
            .map_err(|source| ReconcileError::Parameter {
                namespace: namespace.to_string(),
                key: key.to_string(),
                source,
            })?;

        let age = self.installation.age(self.now);
        let grace_window = self.settings.grace_window;
        let mut waiting = false;

        self.cancel.check()?;
        create_or_update_config(self.client, namespace, name, |data| {
            let mut config = StrategyConfig::new(data);
            let document = config.network()?.unwrap_or_default();
            match propagate_cidr(document, parameter.as_deref(), age, grace_window)? {
                CidrOutcome::Updated(document) => {
                    config.set_network(&document)?;
                    info!(
                        %namespace,
                        cidr = parameter.as_deref().unwrap_or_default(),
                        "network range written"
                    );
                }
                CidrOutcome::Waiting => waiting = true,
                CidrOutcome::AlreadySet(_) | CidrOutcome::Unchanged => {}
            }
            Ok(())
        })?;

        if waiting {
            return Ok(Phase::InProgress);
        }
        Ok(Phase::Completed)
    }

    /// Seed a default production tier into every kind's document.
    pub fn reconcile_strategy_defaults(&self) -> ReconcileResult<Phase> {
        self.cancel.check()?;
        let namespace = self.installation.namespace.as_str();
        let name = self.settings.strategies_config.as_str();
        let times = &self.settings.times;

        let outcome = create_or_update_config(self.client, namespace, name, |data| {
            let mut config = StrategyConfig::new(data);
            for kind in ResourceKind::ALL {
                let mut document = config.document(kind)?.unwrap_or_default();
                if ensure_default_tier(&mut document, kind, TIER_PRODUCTION, times)? {
                    debug!(%namespace, %kind, "default production tier seeded");
                    config.set_document(kind, &document)?;
                }
            }
            Ok(())
        })?;
        if outcome != OperationResult::Unchanged {
            info!(%namespace, %name, outcome = ?outcome, "strategy defaults reconciled");
        }
        Ok(Phase::Completed)
    }

    /// Overwrite the production tier's service updates for `kind`.
    pub fn reconcile_service_updates(
        &self,
        kind: ResourceKind,
        allow_list: &[String],
    ) -> ReconcileResult<Phase> {
        self.cancel.check()?;
        let namespace = self.installation.namespace.as_str();
        let name = self.settings.strategies_config.as_str();
        let mut changed = false;

        create_or_update_config(self.client, namespace, name, |data| {
            let mut config = StrategyConfig::new(data);
            let document = config.document(kind)?.unwrap_or_default();
            let (document, updated) = set_service_updates(document, TIER_PRODUCTION, allow_list)?;
            if updated {
                config.set_document(kind, &document)?;
                changed = true;
            }
            Ok(())
        })?;

        if changed {
            info!(%namespace, %kind, updates = ?allow_list, "service updates written");
            return Ok(Phase::InProgress);
        }
        Ok(Phase::Completed)
    }
}
