use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid YAML in {path}: {reason}")]
    InvalidYaml { path: PathBuf, reason: String },

    #[error("Invalid schema definition: {reason}")]
    InvalidSchema { reason: String },

    #[error("Settings validation failed: {errors}")]
    SchemaViolation { errors: String },

    #[error("Missing settings key: {key}")]
    MissingKey { key: String },

    #[error("Template file not found: {path}")]
    MissingTemplate { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
