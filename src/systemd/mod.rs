//! Systemd unit lifecycle management.
//!
//! A reusable capability for components that run under systemd: computes the
//! desired unit set for the current host from a template and an instance
//! count, syncs it against the units recorded by the previous run, and
//! drives `systemctl` over the desired set.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::ConfigError;
use crate::tasks::{TaskContext, TaskError};
use crate::template;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceSpec {
    #[serde(default)]
    pub count: u32,
    /// Percentage of the host's CPU cores added to `count`.
    #[serde(default)]
    pub percent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemdSettings {
    /// Local template path for the unit file.
    pub template: PathBuf,

    /// Unit name pattern; `{{instance}}` expands per instance.
    pub name: String,

    /// Enable the unit at boot during sync.
    #[serde(default)]
    pub boot: bool,

    /// Units flagged non-managed are skipped by start/stop/restart/status.
    #[serde(default = "default_manage")]
    pub manage: bool,

    #[serde(default)]
    pub instances: InstanceSpec,

    /// Extra template context merged into every unit render.
    #[serde(default)]
    pub context: Value,

    #[serde(default = "default_unit_dir")]
    pub dir: PathBuf,
}

fn default_manage() -> bool {
    true
}

fn default_unit_dir() -> PathBuf {
    PathBuf::from("/etc/systemd/system")
}

#[derive(Debug, Clone)]
pub struct UnitInstance {
    pub instance: u32,
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct SystemdUnits {
    namespace: String,
    settings: SystemdSettings,
}

impl SystemdUnits {
    /// Build from a component's resolved settings; expects a `systemd` key.
    pub fn from_settings(namespace: &str, settings: &Value) -> Result<Self, ConfigError> {
        let section = settings.get("systemd").ok_or_else(|| ConfigError::MissingKey {
            key: format!("{namespace}.systemd"),
        })?;
        let parsed: SystemdSettings = serde_json::from_value(section.clone())?;
        Ok(Self {
            namespace: namespace.to_string(),
            settings: parsed,
        })
    }

    fn cache_file(&self) -> String {
        format!("~/.{}_units", self.namespace)
    }

    /// Shell command replacing the unit record with exactly `paths`. A
    /// truncating write, so repeated syncs never accumulate duplicates.
    fn record_rewrite_command(&self, paths: &[String]) -> String {
        if paths.is_empty() {
            return format!("rm -rf {}", self.cache_file());
        }
        format!("printf '%s\\n' {} > {}", paths.join(" "), self.cache_file())
    }

    /// Expand the unit name pattern for a fixed instance count.
    pub fn unit_names(&self, count: u32) -> Result<Vec<String>, TaskError> {
        (1..=count.max(1))
            .map(|instance| {
                template::render(
                    &self.settings.name,
                    &serde_json::json!({"instance": instance}),
                )
                .map_err(|e| TaskError::Failed {
                    namespace: self.namespace.clone(),
                    task: "systemd".to_string(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    async fn desired_units(&self, ctx: &TaskContext) -> Result<Vec<UnitInstance>, TaskError> {
        let count = ctx
            .session
            .instances_count(self.settings.instances.count, self.settings.instances.percent)
            .await?;
        let names = self.unit_names(count)?;
        Ok(names
            .into_iter()
            .enumerate()
            .map(|(index, name)| UnitInstance {
                instance: index as u32 + 1,
                path: self.settings.dir.join(&name),
                name,
            })
            .collect())
    }

    /// Sync units on the host: delete undesired units recorded by the last
    /// run, render and upload every desired unit, rewrite the record, reload
    /// the daemon and enable boot-flagged units.
    pub async fn sync(&self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        let cache_file = self.cache_file();

        // The record may not exist yet; that is not an error.
        let old_units: BTreeSet<String> = match ctx
            .session
            .run(&format!("cat {cache_file}"))
            .await
        {
            Ok(text) => text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => BTreeSet::new(),
        };

        let units = self.desired_units(ctx).await?;
        let new_units: BTreeSet<String> =
            units.iter().map(|u| u.path.display().to_string()).collect();

        let obsolete: Vec<&String> = old_units.difference(&new_units).collect();
        if !obsolete.is_empty() {
            info!(count = obsolete.len(), "removing obsolete systemd units");
            let names: Vec<&str> = obsolete
                .iter()
                .filter_map(|path| path.rsplit('/').next())
                .collect();
            let paths: Vec<String> = obsolete.iter().map(|s| s.to_string()).collect();
            let root = ctx.session.become_user("root");
            root.run(&format!("systemctl disable {}", names.join(" ")))
                .await?;
            root.run(&format!("rm -rf {}", paths.join(" "))).await?;
        }

        for unit in &units {
            let mut context = serde_json::json!({
                "instance": unit.instance,
                "settings": ctx.settings,
            });
            if let (Value::Object(map), Value::Object(extra)) =
                (&mut context, &self.settings.context)
            {
                for (key, value) in extra {
                    map.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }

            let root = ctx.session.become_user("root");
            root.upload_template(&ctx.upload_lock, &self.settings.template, &unit.path, &context)
                .await?;
        }

        // The record reflects exactly the desired set after every sync.
        ctx.session
            .run(&self.record_rewrite_command(
                &units
                    .iter()
                    .map(|u| u.path.display().to_string())
                    .collect::<Vec<_>>(),
            ))
            .await?;

        let root = ctx.session.become_user("root");
        root.run("systemctl daemon-reload").await?;
        drop(root);

        if self.settings.boot {
            self.systemctl(ctx, "enable", true).await?;
        }
        Ok(())
    }

    /// Run one systemctl verb over the desired unit set.
    pub async fn systemctl(
        &self,
        ctx: &mut TaskContext,
        command: &str,
        boot_only: bool,
    ) -> Result<Vec<String>, TaskError> {
        if !self.settings.manage {
            return Ok(Vec::new());
        }
        if boot_only && !self.settings.boot {
            return Ok(Vec::new());
        }

        let units = self.desired_units(ctx).await?;
        let mut results = Vec::new();
        for unit in &units {
            let root = ctx.session.become_user("root");
            let output = root
                .run(&format!("systemctl {command} {}", unit.name))
                .await?;
            results.push(output);
        }
        Ok(results)
    }

    pub async fn start(&self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        self.systemctl(ctx, "start", false).await?;
        Ok(())
    }

    pub async fn stop(&self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        self.systemctl(ctx, "stop", false).await?;
        Ok(())
    }

    pub async fn restart(&self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        self.systemctl(ctx, "restart", false).await?;
        Ok(())
    }

    pub async fn status(&self, ctx: &mut TaskContext) -> Result<Vec<String>, TaskError> {
        self.systemctl(ctx, "status", false).await
    }
}
