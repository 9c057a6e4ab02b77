//! Deployment manager facade.
//!
//! Wires configuration, provider backends, components and the operator
//! prompt together, then drives one invocation: reconcile the inventory,
//! run the command batch.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::inventory::{ProviderBackend, ProviderError, ReadinessProbe, Reconciler, TcpProbe};
use crate::prompt::{OperatorPrompt, TerminalPrompt};
use crate::tasks::{Component, TaskError, TaskRegistry, TaskScheduler};
use crate::types::{DeployConfig, Inventory};

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Task(#[from] TaskError),
}

pub struct DeployManager {
    config: Arc<DeployConfig>,
    registry: TaskRegistry,
    backends: Vec<Arc<dyn ProviderBackend>>,
    prompt: Arc<dyn OperatorPrompt>,
    probe: Arc<dyn ReadinessProbe>,
    verbose: bool,
    force: bool,
}

impl DeployManager {
    pub fn new(config: DeployConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: TaskRegistry::new(),
            backends: Vec::new(),
            prompt: Arc::new(TerminalPrompt),
            probe: Arc::new(TcpProbe::default()),
            verbose: false,
            force: false,
        }
    }

    pub fn register_component(&mut self, component: Arc<dyn Component>) -> Result<(), TaskError> {
        self.registry.register(component)
    }

    pub fn register_provider(&mut self, backend: Arc<dyn ProviderBackend>) {
        self.backends.push(backend);
    }

    /// Replace the operator prompt; automation injects a scripted one here.
    pub fn with_prompt(mut self, prompt: Arc<dyn OperatorPrompt>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn set_force(&mut self, force: bool) {
        self.force = force;
    }

    /// Reconcile the host inventory without running any task.
    pub async fn reconcile(&self) -> Result<Inventory, ProviderError> {
        let reconciler = Reconciler::new(
            self.config.clone(),
            self.backends.clone(),
            self.prompt.clone(),
            self.probe.clone(),
            self.force,
        );
        reconciler.reconcile().await
    }

    /// Run a command batch against the reconciled inventory.
    ///
    /// Leading `-f` (force cache invalidation) and `-v` (verbose command
    /// echo) flags may travel inside the command list.
    pub async fn run(&mut self, commands: &[String]) -> Result<Option<String>, DeployError> {
        let commands: Vec<String> = commands
            .iter()
            .filter(|raw| match raw.as_str() {
                "-f" => {
                    self.force = true;
                    false
                }
                "-v" => {
                    self.verbose = true;
                    false
                }
                _ => true,
            })
            .cloned()
            .collect();

        let inventory = Arc::new(self.reconcile().await?);
        debug!(components = inventory.components.len(), "inventory ready");

        let scheduler = TaskScheduler::new(
            self.registry.clone(),
            self.config.clone(),
            inventory,
            self.prompt.clone(),
            self.verbose,
        );
        Ok(scheduler.run(&commands).await?)
    }
}
