//! Three-phase task scheduler.
//!
//! Resolves a command batch into before-hooks, primary tasks and
//! after-hooks, then runs the phases behind strict barriers: every
//! before-hook completes before any primary body starts, and after-hooks
//! start only once every primary task has finished. Hooks run once per
//! command against the synthetic no-host context.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::prompt::OperatorPrompt;
use crate::tasks::command::Command;
use crate::tasks::error::TaskError;
use crate::tasks::executor::Executor;
use crate::tasks::registry::{Component, TaskDescriptor, TaskRegistry};
use crate::tasks::selector::select_hosts;
use crate::types::{DeployConfig, Host, Inventory};

struct PlannedTask {
    component: Arc<dyn Component>,
    descriptor: TaskDescriptor,
    args: Vec<String>,
}

struct PlannedHook {
    component: Arc<dyn Component>,
    name: &'static str,
}

pub struct TaskScheduler {
    registry: TaskRegistry,
    config: Arc<DeployConfig>,
    inventory: Arc<Inventory>,
    prompt: Arc<dyn OperatorPrompt>,
    verbose: bool,
}

impl TaskScheduler {
    pub fn new(
        registry: TaskRegistry,
        config: Arc<DeployConfig>,
        inventory: Arc<Inventory>,
        prompt: Arc<dyn OperatorPrompt>,
        verbose: bool,
    ) -> Self {
        Self {
            registry,
            config,
            inventory,
            prompt,
            verbose,
        }
    }

    /// Run a command batch. Returns the output of the last primary task.
    ///
    /// An unknown namespace is fatal for the whole batch before anything
    /// executes; an unknown task name is reported and skipped while the
    /// rest of the batch still runs.
    pub async fn run(&self, commands: &[String]) -> Result<Option<String>, TaskError> {
        let mut before = Vec::new();
        let mut primary = Vec::new();
        let mut after = Vec::new();

        for raw in commands {
            let command: Command = raw.parse()?;
            let component = self.registry.get(&command.namespace)?.clone();
            let Some(descriptor) = component.descriptor(&command.task) else {
                error!(
                    namespace = %command.namespace,
                    task = %command.task,
                    "no such task, skipping command"
                );
                continue;
            };

            for hook in descriptor.before {
                before.push(PlannedHook {
                    component: component.clone(),
                    name: hook,
                });
            }
            for hook in descriptor.after {
                after.push(PlannedHook {
                    component: component.clone(),
                    name: hook,
                });
            }
            primary.push(PlannedTask {
                component,
                descriptor,
                args: command.args,
            });
        }

        let upload_lock = Arc::new(Mutex::new(()));
        let executor = Executor::new(
            self.config.clone(),
            self.inventory.clone(),
            upload_lock,
            self.verbose,
        );

        for hook in &before {
            self.run_hook(&executor, hook).await?;
        }

        let mut result = None;
        for task in primary {
            info!(
                namespace = task.component.namespace(),
                task = task.descriptor.name,
                "running task"
            );
            let hosts = select_hosts(
                task.component.namespace(),
                &task.descriptor,
                &self.inventory,
                self.prompt.as_ref(),
            )?;
            result = executor
                .execute(task.component, task.descriptor, task.args, hosts)
                .await?;
        }

        for hook in &after {
            self.run_hook(&executor, hook).await?;
        }

        Ok(result)
    }

    /// Hooks are orchestration-level: one invocation per command, no host.
    async fn run_hook(&self, executor: &Executor, hook: &PlannedHook) -> Result<(), TaskError> {
        info!(
            namespace = hook.component.namespace(),
            hook = hook.name,
            "running hook"
        );
        let mut ctx =
            executor.build_context(hook.component.as_ref(), Host::synthetic(), Vec::new())?;
        hook.component.run(hook.name, &mut ctx).await?;
        Ok(())
    }
}
