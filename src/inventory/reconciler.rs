//! Provider reconciliation engine.
//!
//! Per backend the pass moves desired -> diffed -> converging -> persisted:
//! expand replica counts into concrete desired hosts, diff them against the
//! cached mapping from the previous run, destroy/create through the backend,
//! wait for ssh readiness, refresh known-hosts, then persist the merged
//! mapping atomically. An unchanged pass with a valid cache short-circuits
//! to the cached mapping with zero backend calls.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::inventory::cache::{ComponentHosts, HostCache};
use crate::inventory::error::ProviderError;
use crate::inventory::provider::{
    expand_desired, unmanaged_hosts, DesiredHost, ProviderBackend,
};
use crate::inventory::readiness::ReadinessProbe;
use crate::prompt::OperatorPrompt;
use crate::types::{DeployConfig, Host, Inventory};

pub struct Reconciler {
    config: Arc<DeployConfig>,
    backends: Vec<Arc<dyn ProviderBackend>>,
    prompt: Arc<dyn OperatorPrompt>,
    probe: Arc<dyn ReadinessProbe>,
    cache: HostCache,
    force: bool,
}

impl Reconciler {
    pub fn new(
        config: Arc<DeployConfig>,
        backends: Vec<Arc<dyn ProviderBackend>>,
        prompt: Arc<dyn OperatorPrompt>,
        probe: Arc<dyn ReadinessProbe>,
        force: bool,
    ) -> Self {
        let cache = HostCache::new(config.cache_file(), config.env.clone());
        Self {
            config,
            backends,
            prompt,
            probe,
            cache,
            force,
        }
    }

    /// Build the authoritative inventory for this run.
    pub async fn reconcile(&self) -> Result<Inventory, ProviderError> {
        if self.force {
            info!("force flag set, invalidating host cache");
            self.cache.clear()?;
        }

        let cached_map = self.cache.load()?;
        let cached_hosts = flatten(cached_map.as_ref());

        let mut first_error = None;
        let mut changed = cached_map.is_none();
        let mut managed_hosts = Vec::new();

        // Backends reconcile independently; one failing pass never blocks
        // the others.
        for backend in &self.backends {
            match self.reconcile_backend(backend.as_ref(), &cached_hosts).await {
                Ok((hosts, backend_changed)) => {
                    changed |= backend_changed;
                    managed_hosts.extend(hosts);
                }
                Err(err) => {
                    error!(provider = backend.name(), %err, "provider reconciliation failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        let managed: Vec<String> = self
            .backends
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        let external = unmanaged_hosts(&self.config, &managed);

        if !changed {
            if let Some(cached) = cached_map {
                info!("inventory unchanged, reusing cached host mapping");
                return Ok(Inventory { components: cached });
            }
        }

        let mut all_hosts = managed_hosts;
        all_hosts.extend(external);
        // Names must be unique across backends and unmanaged groups, not
        // just within one backend's pass.
        ensure_unique_names(all_hosts.iter().map(|h| h.name.as_str()))?;
        let inventory = Inventory::from_hosts(all_hosts.iter());

        self.cache.store(&inventory.components)?;
        info!(
            hosts = all_hosts.len(),
            components = inventory.components.len(),
            "reconciliation persisted"
        );
        Ok(inventory)
    }

    async fn reconcile_backend(
        &self,
        backend: &dyn ProviderBackend,
        cached_hosts: &HashMap<String, Host>,
    ) -> Result<(Vec<Host>, bool), ProviderError> {
        let desired = expand_desired(&self.config, backend)?;
        ensure_unique_names(desired.iter().map(|d| d.name.as_str()))?;

        let cached_for_backend: HashMap<&str, &Host> = cached_hosts
            .values()
            .filter(|host| host.provider.as_deref() == Some(backend.name()))
            .map(|host| (host.name.as_str(), host))
            .collect();

        let to_create: Vec<&DesiredHost> = desired
            .iter()
            .filter(|d| !cached_for_backend.contains_key(d.name.as_str()))
            .collect();
        let to_destroy: Vec<&Host> = cached_for_backend
            .values()
            .filter(|host| !desired.iter().any(|d| d.name == host.name))
            .copied()
            .collect();
        let to_update: Vec<&DesiredHost> = desired
            .iter()
            .filter(|d| {
                cached_for_backend
                    .get(d.name.as_str())
                    .is_some_and(|cached| cached.differs_from(&d.to_host(backend.name())))
            })
            .collect();

        if to_create.is_empty() && to_destroy.is_empty() && to_update.is_empty() {
            let unchanged: Vec<Host> = desired
                .iter()
                .filter_map(|d| cached_for_backend.get(d.name.as_str()))
                .map(|&host| host.clone())
                .collect();
            return Ok((unchanged, false));
        }

        info!(
            provider = backend.name(),
            create = to_create.len(),
            destroy = to_destroy.len(),
            resync = to_update.len(),
            "converging provider state"
        );
        let live = backend.list().await?;

        for host in &to_destroy {
            self.destroy_host(backend, host, &live).await?;
        }

        // Creates fan out concurrently; a readiness timeout is fatal for its
        // own host only, siblings run to completion.
        let created: Vec<Result<Host, ProviderError>> = join_all(
            to_create
                .iter()
                .map(|d| self.create_host(backend, d, &live)),
        )
        .await;

        let mut hosts = Vec::new();
        let mut first_error = None;
        for result in created {
            match result {
                Ok(host) => hosts.push(host),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        // Hosts present in both sets carry over, re-synced to the desired
        // metadata while keeping their recorded addresses.
        for entry in &desired {
            if let Some(&cached) = cached_for_backend.get(entry.name.as_str()) {
                let mut host = entry.to_host(backend.name());
                host.public_ip = cached.public_ip.clone();
                host.private_ip = cached.private_ip.clone();
                hosts.push(host);
            }
        }

        let addresses: Vec<String> = hosts
            .iter()
            .filter_map(|host| host.public_ip.clone())
            .collect();
        self.probe.refresh_keys(&addresses).await?;

        Ok((hosts, true))
    }

    async fn destroy_host(
        &self,
        backend: &dyn ProviderBackend,
        host: &Host,
        live: &HashMap<String, crate::inventory::provider::ProviderInstance>,
    ) -> Result<(), ProviderError> {
        let Some(instance) = live.get(&host.name) else {
            warn!(host = %host.name, "obsolete host not found at provider, dropping from cache");
            return Ok(());
        };
        let address = instance.public_ip.as_deref().unwrap_or("unknown");
        let confirmed = self
            .prompt
            .confirm(&format!(
                "do you want to destroy '{}':{} ? [type: y or yes]: ",
                host.name, address
            ))
            .map_err(ProviderError::Io)?;
        if confirmed {
            info!(host = %host.name, provider = backend.name(), "destroying host");
            backend.destroy(instance).await?;
        } else {
            info!(host = %host.name, "destroy skipped by operator");
        }
        Ok(())
    }

    async fn create_host(
        &self,
        backend: &dyn ProviderBackend,
        desired: &DesiredHost,
        live: &HashMap<String, crate::inventory::provider::ProviderInstance>,
    ) -> Result<Host, ProviderError> {
        // An instance may already exist at the provider even when the cache
        // never recorded it; reuse it instead of creating a duplicate.
        let instance = match live.get(&desired.name) {
            Some(existing) => existing.clone(),
            None => {
                info!(host = %desired.name, provider = backend.name(), "creating host");
                backend.create(desired).await?
            }
        };

        let mut host = desired.to_host(backend.name());
        host.public_ip = instance.public_ip.clone();
        host.private_ip = instance.private_ip.clone().or(instance.public_ip);

        self.probe.wait_ready(&host).await?;
        Ok(host)
    }
}

fn flatten(cached: Option<&ComponentHosts>) -> HashMap<String, Host> {
    let mut hosts = HashMap::new();
    if let Some(map) = cached {
        for list in map.values() {
            for host in list {
                hosts.entry(host.name.clone()).or_insert_with(|| host.clone());
            }
        }
    }
    hosts
}

fn ensure_unique_names<'a, I>(names: I) -> Result<(), ProviderError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ProviderError::DuplicateHostName {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
