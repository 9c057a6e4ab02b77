//! Persisted host cache.
//!
//! One JSON document per environment mapping the environment name to the
//! component -> hosts table of the last successful reconciliation. The write
//! is deferred until a whole reconciliation pass completes and is atomic
//! (write-then-rename), so a mid-pass crash leaves the previous cache
//! intact.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use tracing::debug;

use crate::inventory::error::ProviderError;
use crate::types::Host;

pub type ComponentHosts = BTreeMap<String, Vec<Host>>;

#[derive(Debug, Clone)]
pub struct HostCache {
    path: PathBuf,
    env: String,
}

impl HostCache {
    pub fn new(path: PathBuf, env: impl Into<String>) -> Self {
        Self {
            path,
            env: env.into(),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the cached mapping, or `None` when no cache exists yet.
    pub fn load(&self) -> Result<Option<ComponentHosts>, ProviderError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)?;
        let document: BTreeMap<String, ComponentHosts> =
            serde_json::from_str(&text).map_err(|e| ProviderError::CacheCorrupted {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(document.get(&self.env).cloned())
    }

    /// Atomically overwrite the cache with `hosts`.
    pub fn store(&self, hosts: &ComponentHosts) -> Result<(), ProviderError> {
        let mut document = BTreeMap::new();
        document.insert(self.env.clone(), hosts);

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir)?;

        let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
        staged.write_all(serde_json::to_string_pretty(&document)?.as_bytes())?;
        staged
            .persist(&self.path)
            .map_err(|e| ProviderError::Io(e.error))?;

        debug!(path = %self.path.display(), "persisted host cache");
        Ok(())
    }

    /// Delete the cache; used by the force flag before reconciliation.
    pub fn clear(&self) -> Result<(), ProviderError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
