//! Convoy - deployment orchestration engine
//!
//! This crate reconciles a declarative host inventory against cloud
//! providers and executes named, composable tasks against subsets of those
//! hosts over SSH, with templated file delivery and systemd unit lifecycle
//! management.

pub mod cli;
pub mod config;
pub mod inventory;
pub mod manager;
pub mod prompt;
pub mod session;
pub mod systemd;
pub mod tasks;
pub mod template;
pub mod types;

pub use manager::{DeployError, DeployManager};
pub use types::{DeployConfig, Host, Inventory};
