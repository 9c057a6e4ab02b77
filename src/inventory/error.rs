use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider {provider} failed: {reason}")]
    Backend { provider: String, reason: String },

    #[error("Host {host} never became reachable within {attempts} attempts")]
    ReadinessTimeout { host: String, attempts: u32 },

    #[error("Host cache corrupted at {path}: {reason}")]
    CacheCorrupted { path: PathBuf, reason: String },

    #[error("Host name \"{name}\" appears more than once in the reconciled inventory")]
    DuplicateHostName { name: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
