//! cloudkeep-state: embedded declarative resource store for cloudkeep.
//!
//! Backed by [redb](https://docs.rs/redb), stands in for the declarative API
//! server the reconciler talks to: namespaces, extension schemas, resource
//! claims, snapshots, secrets, and keyed configuration objects.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{kind}/{namespace}/{name}`, `{namespace}/{name}`) enable
//! prefix scans for namespaced enumeration.
//!
//! Configuration objects carry a `generation`. Updates are write-if-match:
//! an update whose generation does not equal the stored one is rejected with
//! [`StateError::Conflict`] instead of overwriting a concurrent write.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
