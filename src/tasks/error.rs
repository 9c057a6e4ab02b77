use thiserror::Error;

use crate::config::ConfigError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Namespace already registered: {namespace}")]
    DuplicateNamespace { namespace: String },

    #[error("No tasks registered for: \"{namespace}\"")]
    UnknownNamespace { namespace: String },

    #[error("No task \"{task}\" in namespace \"{namespace}\"")]
    UnknownTask { namespace: String, task: String },

    #[error("Invalid command \"{command}\", expected \"namespace.task[:arg,arg]\"")]
    InvalidCommand { command: String },

    #[error("No hosts carry component \"{namespace}\" for task \"{task}\"")]
    NoHosts { namespace: String, task: String },

    #[error("Invalid host choice: {input}")]
    InvalidChoice { input: String },

    #[error("Task {namespace}.{task} failed: {reason}")]
    Failed {
        namespace: String,
        task: String,
        reason: String,
    },

    #[error("Task worker panicked: {reason}")]
    Worker { reason: String },

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
