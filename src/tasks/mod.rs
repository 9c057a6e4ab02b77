//! Task orchestration: registry, host selection, concurrent execution.

pub mod command;
pub mod error;
pub mod executor;
pub mod registry;
pub mod scheduler;
pub mod selector;

pub use command::Command;
pub use error::TaskError;
pub use executor::Executor;
pub use registry::{
    resolve_component_settings, session_user, Component, HostPolicy, TaskContext, TaskDescriptor,
    TaskRegistry,
};
pub use scheduler::TaskScheduler;
pub use selector::select_hosts;
