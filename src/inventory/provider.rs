//! Provider backend seam and desired-state expansion.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::config::{merge_values, validate_schema};
use crate::inventory::error::ProviderError;
use crate::types::{DeployConfig, Host};

/// One concrete desired host entry, expanded from a host group's replica
/// count and tagged with its owning components.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredHost {
    pub name: String,
    pub group: String,
    pub ssh_port: u16,
    pub components: BTreeMap<String, Value>,
    /// Backend-specific settings, merged and schema-validated.
    pub provider_settings: Value,
}

impl DesiredHost {
    /// The host record this entry would persist, before addresses are known.
    pub fn to_host(&self, provider: &str) -> Host {
        Host {
            name: self.name.clone(),
            public_ip: None,
            private_ip: None,
            ssh_port: self.ssh_port,
            provider: Some(provider.to_string()),
            components: self.components.clone(),
        }
    }
}

/// A live compute instance as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInstance {
    pub id: String,
    pub name: String,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
}

/// Pluggable reconciliation strategy for one cloud (or local) provider.
///
/// Backends own the provider API/CLI calls only; diffing, convergence order,
/// readiness and persistence are the reconciler's.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Backend-specific settings defaults.
    fn defaults(&self) -> Value {
        serde_json::json!({})
    }

    /// JSON-Schema for the backend-specific settings.
    fn schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    /// List currently provisioned instances, keyed by name.
    async fn list(&self) -> Result<HashMap<String, ProviderInstance>, ProviderError>;

    async fn create(&self, desired: &DesiredHost) -> Result<ProviderInstance, ProviderError>;

    async fn destroy(&self, instance: &ProviderInstance) -> Result<(), ProviderError>;
}

/// Expand every host group owned by `provider` into concrete desired
/// entries: `prefix-name`, `prefix-name-2`, ... by replica count.
pub fn expand_desired(
    config: &DeployConfig,
    provider: &dyn ProviderBackend,
) -> Result<Vec<DesiredHost>, ProviderError> {
    let global = config
        .providers
        .get(provider.name())
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));
    let schema = provider.schema();
    let defaults = provider.defaults();

    let mut desired = Vec::new();
    for group in &config.hosts {
        if group.provider.as_deref() != Some(provider.name()) {
            continue;
        }

        let group_settings = Value::Object(
            group
                .provider_settings
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        let mut settings = merge_values(&defaults, &global);
        settings = merge_values(&settings, &group_settings);
        validate_schema(&schema, &settings)?;

        let base = if config.prefix.is_empty() {
            group.name.clone()
        } else {
            format!("{}-{}", config.prefix, group.name)
        };
        for index in 1..=group.count.max(1) {
            let name = if index > 1 {
                format!("{base}-{index}")
            } else {
                base.clone()
            };
            desired.push(DesiredHost {
                name,
                group: group.name.clone(),
                ssh_port: group.ssh_port,
                components: group.components.clone(),
                provider_settings: settings.clone(),
            });
        }
    }

    Ok(desired)
}

/// Host groups that no registered provider manages pass through
/// reconciliation untouched, with the addresses the configuration supplies.
pub fn unmanaged_hosts(config: &DeployConfig, managed: &[String]) -> Vec<Host> {
    config
        .hosts
        .iter()
        .filter(|group| match &group.provider {
            Some(name) => !managed.contains(name),
            None => true,
        })
        .map(|group| Host {
            name: group.name.clone(),
            public_ip: group.public_ip.clone(),
            private_ip: group
                .private_ip
                .clone()
                .or_else(|| group.public_ip.clone()),
            ssh_port: group.ssh_port,
            provider: group.provider.clone(),
            components: group.components.clone(),
        })
        .collect()
}
