//! cloudkeep reconciler: install and uninstall passes over an
//! installation's cloud resources.
//!
//! A pass is synchronous and re-entrant. It reads the current state through
//! a [`ClusterClient`], does whatever single step of work is due, and
//! returns a [`Phase`] telling the scheduler whether to call again.
//!
//! # Components
//!
//! - **`driver`**: Ordered install steps and the uninstall sequence
//! - **`teardown`**: Snapshots, delete strategies, then claims
//! - **`install`**: Namespace, credentials, network range, strategy defaults, service updates
//! - **`client`**: Store, parameter and notification boundaries
//! - **`phase`**: Completed / InProgress / Failed and the first-incomplete combinator
//! - **`cancel`**: Cancellation signal checked before each boundary call

pub mod cancel;
pub mod client;
pub mod driver;
pub mod error;
pub mod install;
pub mod phase;
pub mod teardown;

pub use cancel::Cancellation;
pub use client::{
    ClusterClient, Notifier, ParameterSource, SecretParameterSource, TracingNotifier,
    create_or_update_config, epoch_secs, update_existing_config,
};
pub use driver::{Reconciler, ReconcilerSettings};
pub use error::{ReconcileError, ReconcileResult};
pub use phase::Phase;
pub use teardown::{ClaimCounts, Teardown, TeardownStage};
