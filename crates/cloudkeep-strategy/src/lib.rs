//! cloudkeep strategy documents: tier-keyed provider strategies and the
//! merge engine that patches them.
//!
//! Each resource kind has one JSON document in the strategy configuration
//! object, mapping a tier name to a record with `createStrategy`,
//! `deleteStrategy` and `serviceUpdates`. Everything here is pure: callers
//! hand in the configuration object's data and store the result.
//!
//! # Components
//!
//! - **`document`**: Typed tier-keyed documents; unknown fields kept as raw JSON
//! - **`merge`**: Replace one field in every tier, leaving the rest verbatim
//! - **`deletion`**: Destructive delete strategies installed before teardown
//! - **`network`**: Write-once CIDR propagation into the `_network` document
//! - **`service_updates`**: Allow-list overwrite of one tier's `serviceUpdates`
//! - **`defaults`**: Default production tiers with backup/maintenance windows
//! - **`config`**: Decode/encode boundary over the configuration object's data

pub mod config;
pub mod defaults;
pub mod deletion;
pub mod document;
pub mod error;
pub mod merge;
pub mod network;
pub mod service_updates;

pub use config::StrategyConfig;
pub use defaults::StrategyTimeConfig;
pub use document::{StrategyDocument, StrategyField, TierStrategy};
pub use error::{StrategyError, StrategyResult};
pub use network::{CidrOutcome, propagate_cidr};
pub use service_updates::set_service_updates;
