use std::path::PathBuf;
use thiserror::Error;

use crate::template::TemplateError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Command \"{command}\" failed with exit code {code}:\n{stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Host {host} has no address for file transfer")]
    NoAddress { host: String },

    #[error("Template file not found: {path}")]
    MissingTemplate { path: PathBuf },

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
