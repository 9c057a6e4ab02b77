//! Shared data model: hosts, inventory, deployment configuration.

pub mod config;
pub mod host;

pub use config::{DeployConfig, HostGroup};
pub use host::{Host, Inventory, DEFAULT_SSH_PORT, NOHOST_USER};
