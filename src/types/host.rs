//! Host identity and inventory types shared by every subsystem.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default ssh port used when a host record carries none.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// User name recorded for the synthetic no-host context.
pub const NOHOST_USER: &str = "__nohost__";

/// One addressable remote machine, or the synthetic "no host".
///
/// Created by the provider reconciler and immutable for the duration of a
/// run. The `components` map carries per-host override mappings; its key set
/// is the authoritative component set of the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub private_ip: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub components: BTreeMap<String, serde_json::Value>,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl Host {
    /// Synthetic host used for orchestration-level tasks and hooks that do
    /// not address a real machine. Commands against it run locally.
    pub fn synthetic() -> Self {
        Self {
            name: "nohost".to_string(),
            public_ip: None,
            private_ip: None,
            ssh_port: 0,
            provider: None,
            components: BTreeMap::new(),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.public_ip.is_none() && self.private_ip.is_none()
    }

    /// Two records refer to the same machine across runs iff both addresses
    /// match.
    pub fn same_machine(&self, other: &Host) -> bool {
        self.public_ip == other.public_ip && self.private_ip == other.private_ip
    }

    /// True when any non-address field differs. Address drift alone does not
    /// count as a change: providers may reassign addresses on reboot.
    pub fn differs_from(&self, other: &Host) -> bool {
        self.name != other.name
            || self.ssh_port != other.ssh_port
            || self.provider != other.provider
            || self.components != other.components
    }

    /// Key used to serialize task execution per physical machine.
    pub fn address_key(&self) -> String {
        self.public_ip.clone().unwrap_or_else(|| self.name.clone())
    }

    pub fn has_component(&self, namespace: &str) -> bool {
        self.components.contains_key(namespace)
    }
}

/// The resolved component -> hosts mapping for one run.
///
/// Rebuilt once per invocation by merging all providers' reconciliation
/// results; read-only afterwards, so concurrent tasks share it without
/// locking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub components: BTreeMap<String, Vec<Host>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the component map from a flat host list, fanning each host out
    /// under every component it carries.
    pub fn from_hosts<'a, I>(hosts: I) -> Self
    where
        I: IntoIterator<Item = &'a Host>,
    {
        let mut components: BTreeMap<String, Vec<Host>> = BTreeMap::new();
        for host in hosts {
            for component in host.components.keys() {
                components
                    .entry(component.clone())
                    .or_default()
                    .push(host.clone());
            }
        }
        Self { components }
    }

    pub fn hosts_for(&self, namespace: &str) -> &[Host] {
        self.components
            .get(namespace)
            .map(|hosts| hosts.as_slice())
            .unwrap_or(&[])
    }

    /// All distinct hosts, deduplicated by name.
    pub fn all_hosts(&self) -> Vec<&Host> {
        let mut seen = std::collections::BTreeSet::new();
        let mut hosts = Vec::new();
        for list in self.components.values() {
            for host in list {
                if seen.insert(host.name.as_str()) {
                    hosts.push(host);
                }
            }
        }
        hosts
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
