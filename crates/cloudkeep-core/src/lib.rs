pub mod config;
pub mod types;

pub use config::KeeperConfig;
pub use types::*;
