//! Concurrency executor.
//!
//! One task instance per selected host, grouped by network address: at most
//! one task runs per distinct address at a time, while distinct addresses
//! run fully in parallel. A single physical machine often appears under
//! several logical names, and concurrent mutating ssh sessions against the
//! same address are unsafe.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::session::RemoteSession;
use crate::tasks::error::TaskError;
use crate::tasks::registry::{
    resolve_component_settings, session_user, Component, TaskContext, TaskDescriptor,
};
use crate::types::{DeployConfig, Host, Inventory};

pub struct Executor {
    config: Arc<DeployConfig>,
    inventory: Arc<Inventory>,
    upload_lock: Arc<Mutex<()>>,
    verbose: bool,
}

impl Executor {
    pub fn new(
        config: Arc<DeployConfig>,
        inventory: Arc<Inventory>,
        upload_lock: Arc<Mutex<()>>,
        verbose: bool,
    ) -> Self {
        Self {
            config,
            inventory,
            upload_lock,
            verbose,
        }
    }

    /// Build one fresh task context for `host`.
    pub fn build_context(
        &self,
        component: &dyn Component,
        host: Host,
        args: Vec<String>,
    ) -> Result<TaskContext, TaskError> {
        let settings = resolve_component_settings(component, &self.config, &host)?;
        let user = session_user(component.namespace(), &settings, &host);
        Ok(TaskContext {
            session: RemoteSession::new(host, user, self.verbose),
            settings,
            inventory: self.inventory.clone(),
            upload_lock: self.upload_lock.clone(),
            args,
        })
    }

    /// Run one task across `hosts` and return the output of the last host in
    /// selection order.
    ///
    /// All per-address queues are awaited jointly. A failing task aborts
    /// only its own queue; queues already in flight run to completion, and
    /// the first error is reported once everything has settled.
    pub async fn execute(
        &self,
        component: Arc<dyn Component>,
        descriptor: TaskDescriptor,
        args: Vec<String>,
        hosts: Vec<Host>,
    ) -> Result<Option<String>, TaskError> {
        let mut order = Vec::new();
        let mut queues: HashMap<String, Vec<(usize, Host)>> = HashMap::new();
        for (index, host) in hosts.into_iter().enumerate() {
            let key = host.address_key();
            if !queues.contains_key(&key) {
                order.push(key.clone());
            }
            queues.entry(key).or_default().push((index, host));
        }

        debug!(
            task = descriptor.name,
            namespace = component.namespace(),
            addresses = order.len(),
            "fanning out task"
        );

        // Every context resolves before any queue spawns, so a settings
        // failure on one host aborts the task with zero remote effect.
        let mut queued_contexts = Vec::new();
        for key in order {
            let queue = queues.remove(&key).unwrap_or_default();
            let contexts: Vec<(usize, TaskContext)> = queue
                .into_iter()
                .map(|(index, host)| {
                    self.build_context(component.as_ref(), host, args.clone())
                        .map(|ctx| (index, ctx))
                })
                .collect::<Result<_, TaskError>>()?;
            queued_contexts.push(contexts);
        }

        let mut handles = Vec::new();
        for contexts in queued_contexts {
            let component = component.clone();

            handles.push(tokio::spawn(async move {
                let mut outputs = Vec::new();
                for (index, mut ctx) in contexts {
                    let output = component.run(descriptor.name, &mut ctx).await?;
                    outputs.push((index, output));
                }
                Ok::<_, TaskError>(outputs)
            }));
        }

        let mut outputs: Vec<(usize, Option<String>)> = Vec::new();
        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(mut done)) => outputs.append(&mut done),
                Ok(Err(err)) => {
                    first_error.get_or_insert(err);
                }
                Err(join) => {
                    first_error.get_or_insert(TaskError::Worker {
                        reason: join.to_string(),
                    });
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        outputs.sort_by_key(|(index, _)| *index);
        Ok(outputs.pop().and_then(|(_, output)| output))
    }
}
