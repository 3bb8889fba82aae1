//! cloudkeep.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::types::Installation;

const DEFAULT_INSTALLATION_NAMESPACE: &str = "cloud-resources";
const DEFAULT_STRATEGIES_CONFIG_NAME: &str = "cloud-resources-aws-strategies";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperConfig {
    pub installation: Installation,
    #[serde(default)]
    pub cloud_resources: CloudResourcesConfig,
    #[serde(default)]
    pub strategies: StrategiesConfig,
    #[serde(default)]
    pub service_updates: ServiceUpdatesConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Where the cloud resources product lives. Empty values are derived from the installation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudResourcesConfig {
    pub namespace: Option<String>,
    pub operator_namespace: Option<String>,
    pub strategies_config_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategiesConfig {
    pub backup_start_time: String,
    pub maintenance_start_time: String,
}

impl Default for StrategiesConfig {
    fn default() -> Self {
        Self {
            backup_start_time: "03:01".to_string(),
            maintenance_start_time: "Thu 02:00".to_string(),
        }
    }
}

/// Allow-lists written verbatim into the production tier of each document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceUpdatesConfig {
    pub redis: Vec<String>,
    pub postgres: Vec<String>,
}

impl Default for ServiceUpdatesConfig {
    fn default() -> Self {
        Self {
            redis: vec!["elasticache-20210615-002".to_string()],
            // 2022-01-15T00:00:01Z
            postgres: vec!["1642204801".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Seconds between re-invocations of the driver.
    pub interval_secs: u64,
    /// Seconds after installation creation to keep waiting for the CIDR parameter.
    pub grace_window_secs: u64,
    /// Key of the CIDR value in the addon parameter secret.
    pub cidr_parameter: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            grace_window_secs: 60,
            cidr_parameter: "cidr-range".to_string(),
        }
    }
}

impl ReconcileConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn grace_window(&self) -> Duration {
        Duration::from_secs(self.grace_window_secs)
    }
}

impl KeeperConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: KeeperConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Product namespace, defaulting to `{prefix}cloud-resources`.
    pub fn namespace(&self) -> String {
        self.cloud_resources
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| {
                format!(
                    "{}{}",
                    self.installation.namespace_prefix, DEFAULT_INSTALLATION_NAMESPACE
                )
            })
    }

    /// Namespace the operator runs in.
    pub fn operator_namespace(&self) -> String {
        if let Some(ns) = self
            .cloud_resources
            .operator_namespace
            .as_ref()
            .filter(|ns| !ns.is_empty())
        {
            return ns.clone();
        }
        if self.installation.operators_in_product_namespace {
            self.namespace()
        } else {
            format!("{}-operator", self.namespace())
        }
    }

    pub fn strategies_config_name(&self) -> String {
        self.cloud_resources
            .strategies_config_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_STRATEGIES_CONFIG_NAME.to_string())
    }

    /// Scaffold a config for a new installation.
    pub fn scaffold(name: &str, namespace_prefix: &str, created_at: u64) -> Self {
        KeeperConfig {
            installation: Installation {
                name: name.to_string(),
                namespace: format!("{namespace_prefix}operator"),
                namespace_prefix: namespace_prefix.to_string(),
                created_at,
                use_cluster_storage: false,
                operators_in_product_namespace: false,
                sts: false,
            },
            cloud_resources: CloudResourcesConfig::default(),
            strategies: StrategiesConfig::default(),
            service_updates: ServiceUpdatesConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}
