//! Component registration and the task table.
//!
//! Components register explicitly at process wiring time: a namespace string
//! plus a table of named operations carrying their visibility policy and
//! hook lists as plain struct fields.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config;
use crate::session::RemoteSession;
use crate::tasks::error::TaskError;
use crate::types::{DeployConfig, Host, Inventory, NOHOST_USER};

/// Which hosts a task runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPolicy {
    /// Every host carrying the component.
    All,
    /// One host, chosen interactively when more than one qualifies.
    One,
    /// The first host in inventory order.
    First,
    /// The synthetic no-host; the task is orchestration-level.
    None,
}

/// Declared metadata for one named operation.
#[derive(Debug, Clone, Copy)]
pub struct TaskDescriptor {
    pub name: &'static str,
    pub policy: HostPolicy,
    pub before: &'static [&'static str],
    pub after: &'static [&'static str],
}

impl TaskDescriptor {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            policy: HostPolicy::All,
            before: &[],
            after: &[],
        }
    }

    pub const fn policy(mut self, policy: HostPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub const fn before(mut self, hooks: &'static [&'static str]) -> Self {
        self.before = hooks;
        self
    }

    pub const fn after(mut self, hooks: &'static [&'static str]) -> Self {
        self.after = hooks;
        self
    }
}

/// Everything one task invocation runs through: the host session, freshly
/// resolved component settings, the shared inventory and the run-wide
/// upload lock.
pub struct TaskContext {
    pub session: RemoteSession,
    pub settings: Value,
    pub inventory: Arc<Inventory>,
    pub upload_lock: Arc<Mutex<()>>,
    pub args: Vec<String>,
}

impl TaskContext {
    /// Template context carrying the host record and resolved settings.
    pub fn template_context(&self) -> Value {
        serde_json::json!({
            "host": self.session.host(),
            "settings": self.settings,
        })
    }
}

/// One deployable component: a namespace, a task table and the operation
/// bodies. Hook names listed in descriptors are operations of the same
/// component, invoked against the synthetic no-host context.
#[async_trait]
pub trait Component: Send + Sync {
    fn namespace(&self) -> &str;

    fn descriptors(&self) -> &[TaskDescriptor];

    /// JSON-Schema the component's resolved settings must satisfy.
    fn settings_schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    fn settings_defaults(&self) -> Value {
        serde_json::json!({})
    }

    /// Execute the named operation. `name` is either a descriptor name or a
    /// hook listed by one.
    async fn run(&self, name: &str, ctx: &mut TaskContext)
        -> Result<Option<String>, TaskError>;
}

impl dyn Component {
    pub fn descriptor(&self, name: &str) -> Option<TaskDescriptor> {
        self.descriptors().iter().find(|d| d.name == name).copied()
    }
}

/// Resolve the settings for `component` on `host`: component defaults,
/// then global per-environment overrides, then host-specific overrides,
/// schema-validated.
pub fn resolve_component_settings(
    component: &dyn Component,
    config: &DeployConfig,
    host: &Host,
) -> Result<Value, TaskError> {
    let namespace = component.namespace();
    let global = config.component_overrides(namespace);
    let host_overrides = host
        .components
        .get(namespace)
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));
    let resolved = config::resolve_settings(
        &component.settings_schema(),
        &component.settings_defaults(),
        &[&global, &host_overrides],
    )?;
    Ok(resolved)
}

/// The unix user the component's session impersonates. Defaults to the
/// component namespace, so "nginx" tasks run as the `nginx` user unless the
/// settings say otherwise.
pub fn session_user(namespace: &str, settings: &Value, host: &Host) -> String {
    if host.is_synthetic() {
        return NOHOST_USER.to_string();
    }
    settings
        .get("user")
        .and_then(Value::as_str)
        .unwrap_or(namespace)
        .to_string()
}

/// Namespace -> component table. Built once at process start; immutable
/// afterwards.
#[derive(Default, Clone)]
pub struct TaskRegistry {
    components: BTreeMap<String, Arc<dyn Component>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, component: Arc<dyn Component>) -> Result<(), TaskError> {
        let namespace = component.namespace().to_string();
        if self.components.contains_key(&namespace) {
            return Err(TaskError::DuplicateNamespace { namespace });
        }
        tracing::debug!(%namespace, tasks = component.descriptors().len(), "registered component");
        self.components.insert(namespace, component);
        Ok(())
    }

    pub fn get(&self, namespace: &str) -> Result<&Arc<dyn Component>, TaskError> {
        self.components
            .get(namespace)
            .ok_or_else(|| TaskError::UnknownNamespace {
                namespace: namespace.to_string(),
            })
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }
}
