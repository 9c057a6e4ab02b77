//! Deployment configuration as loaded from the environment's YAML document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::types::host::DEFAULT_SSH_PORT;

/// Top-level deployment configuration for one environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Environment name; keys the persisted host cache.
    pub env: String,

    /// Prefix prepended to every provider-managed host name.
    #[serde(default)]
    pub prefix: String,

    /// Directory holding the persisted host cache (`<env>.json`).
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Desired host groups, expanded by the reconciler.
    #[serde(default)]
    pub hosts: Vec<HostGroup>,

    /// Global per-provider settings, merged under each host's provider
    /// overrides.
    #[serde(default)]
    pub providers: BTreeMap<String, serde_json::Value>,

    /// Global per-component overrides, merged between component defaults and
    /// host-specific overrides.
    #[serde(default)]
    pub components: BTreeMap<String, serde_json::Value>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".")
}

impl DeployConfig {
    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.json", self.env))
    }

    /// Override mapping for `namespace`, or an empty object.
    pub fn component_overrides(&self, namespace: &str) -> serde_json::Value {
        self.components
            .get(namespace)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}))
    }
}

/// One desired host group: `count` replicas provisioned by `provider`, each
/// running the listed components.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostGroup {
    pub name: String,

    #[serde(default = "default_count")]
    pub count: u32,

    /// Provider backend name; absent for externally-supplied hosts.
    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    /// Fixed addresses for hosts not managed by any provider.
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub private_ip: Option<String>,

    /// Component name -> host-specific override mapping.
    #[serde(default)]
    pub components: BTreeMap<String, serde_json::Value>,

    /// Provider-specific fields (plan, region, image, ...), validated by the
    /// backend's own schema during reconciliation.
    #[serde(flatten)]
    pub provider_settings: BTreeMap<String, serde_json::Value>,
}

fn default_count() -> u32 {
    1
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_deserializes_with_defaults() {
        let config: DeployConfig = serde_yaml::from_str(
            r#"
            env: dev
            prefix: app
            hosts:
              - name: web
                count: 2
                provider: test
                plan: small
                components:
                  nginx: {}
            "#,
        )
        .unwrap();

        assert_eq!(config.env, "dev");
        assert_eq!(config.cache_file(), PathBuf::from("./dev.json"));
        assert_eq!(config.hosts.len(), 1);
        let group = &config.hosts[0];
        assert_eq!(group.count, 2);
        assert_eq!(group.ssh_port, 22);
        assert_eq!(
            group.provider_settings.get("plan"),
            Some(&serde_json::json!("small"))
        );
        assert!(group.components.contains_key("nginx"));
    }
}
