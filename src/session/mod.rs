//! Remote execution context.
//!
//! A [`RemoteSession`] is owned exclusively by the task instance that created
//! it and carries the impersonated user and working-directory prefix for one
//! host. Mutation is scoped: [`RemoteSession::become_user`] and
//! [`RemoteSession::prefixed`] return RAII guards that restore the prior
//! value on every exit path, including early returns through `?`.

pub mod error;

pub use error::SessionError;

use std::ops::{Deref, DerefMut};
use std::path::Path;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::template;
use crate::types::Host;

/// Escape a command for embedding inside the double-quoted remote shell
/// invocation.
fn escape_remote(command: &str) -> String {
    command.replace('"', "\\\"").replace("$(", "\\$(")
}

/// Run `command` through the local shell.
///
/// A non-zero exit status with non-empty stderr is a typed failure. A
/// non-zero exit with empty stderr is tolerated as a soft success; remote
/// probes and reboot-style commands rely on that, so it is kept but logged.
pub async fn run_local(command: &str, interactive: bool) -> Result<String, SessionError> {
    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg(command);

    if interactive {
        let status = cmd.status().await?;
        if !status.success() {
            warn!(command, code = status.code(), "interactive command exited non-zero");
        }
        return Ok(String::new());
    }

    let output = cmd.output().await?;
    let code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    if !output.status.success() {
        if !stderr.is_empty() {
            return Err(SessionError::CommandFailed {
                command: command.to_string(),
                code,
                stderr,
            });
        }
        warn!(command, code, "non-zero exit with empty stderr treated as success");
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Execution session against one host (or the local machine for the
/// synthetic no-host).
#[derive(Debug, Clone)]
pub struct RemoteSession {
    host: Host,
    user: String,
    prefix: String,
    verbose: bool,
}

impl RemoteSession {
    pub fn new(host: Host, user: impl Into<String>, verbose: bool) -> Self {
        Self {
            host,
            user: user.into(),
            prefix: String::new(),
            verbose,
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Run `command` on the session's host and return stripped stdout.
    pub async fn run(&self, command: &str) -> Result<String, SessionError> {
        Ok(self.exec(command, false).await?.trim().to_string())
    }

    /// Run `command` with the controlling terminal attached.
    pub async fn run_interactive(&self, command: &str) -> Result<String, SessionError> {
        self.exec(command, true).await
    }

    async fn exec(&self, command: &str, interactive: bool) -> Result<String, SessionError> {
        if self.host.is_synthetic() {
            return run_local(&format!("{}{}", self.prefix, command), interactive).await;
        }

        let public_ip = self.host.public_ip.as_deref().unwrap_or_default();
        if self.verbose {
            info!(
                "[{}:{}@{}] {}",
                self.host.name, self.user, public_ip, command
            );
        }

        let tty_flag = if interactive { "-t " } else { "" };
        let wrapped = format!(
            "ssh {tty_flag}-p {port} {user}@{ip} \"{prefix}{command}\"",
            port = self.host.ssh_port,
            user = self.user,
            ip = public_ip,
            prefix = self.prefix,
            command = escape_remote(command),
        );
        run_local(&wrapped, interactive).await
    }

    /// Run `command` impersonating root.
    pub async fn sudo(&mut self, command: &str) -> Result<String, SessionError> {
        let root = self.become_user("root");
        root.run(command).await
    }

    /// Impersonate `user` until the returned guard drops.
    pub fn become_user(&mut self, user: impl Into<String>) -> UserScope<'_> {
        let saved = std::mem::replace(&mut self.user, user.into());
        UserScope {
            session: self,
            saved,
        }
    }

    /// Prepend `fragment` to every command until the returned guard drops.
    pub fn prefixed(&mut self, fragment: &str) -> PrefixScope<'_> {
        let saved = self.prefix.clone();
        self.prefix = format!("{}{} ", self.prefix, fragment);
        PrefixScope {
            session: self,
            saved,
        }
    }

    /// Run subsequent commands from `path` until the returned guard drops.
    pub fn change_dir(&mut self, path: &Path) -> PrefixScope<'_> {
        self.prefixed(&format!("cd {} &&", path.display()))
    }

    pub async fn rm_rf(&self, path: &Path) -> Result<(), SessionError> {
        self.run(&format!("rm -rf {}", path.display())).await?;
        Ok(())
    }

    pub async fn mkdir(&self, path: &Path, delete: bool) -> Result<(), SessionError> {
        if delete {
            self.rm_rf(path).await?;
        }
        self.run(&format!("mkdir -p {}", path.display())).await?;
        Ok(())
    }

    /// Append `line` to `dest` unless an identical line is already present.
    pub async fn append_line(&self, line: &str, dest: &Path) -> Result<(), SessionError> {
        self.run(&format!(
            "grep -qxF \"{line}\" {dest} || echo \"{line}\" >> {dest}",
            line = line,
            dest = dest.display(),
        ))
        .await?;
        Ok(())
    }

    pub async fn wait(&self, seconds: u64) {
        tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;
    }

    /// Resolve an instance count, optionally derived from a percentage of the
    /// host's CPU cores. Always at least 1.
    pub async fn instances_count(&self, count: u32, percent: u32) -> Result<u32, SessionError> {
        let mut resolved = count;
        if percent > 0 {
            let cores: u32 = self
                .run("nproc --all")
                .await?
                .trim()
                .parse()
                .unwrap_or(1);
            resolved += cores * percent / 100;
        }
        Ok(resolved.max(1))
    }

    /// Sync `local_path` to `remote_path` (or back, when `from_host`) with
    /// rsync over the session's ssh transport.
    pub async fn upload(
        &self,
        local_path: &Path,
        remote_path: Option<&Path>,
        include: &[String],
        exclude: &[String],
        from_host: bool,
    ) -> Result<(), SessionError> {
        let public_ip =
            self.host
                .public_ip
                .as_deref()
                .ok_or_else(|| SessionError::NoAddress {
                    host: self.host.name.clone(),
                })?;

        if !local_path.exists() && !from_host {
            debug!(path = %local_path.display(), "skipping upload of missing local path");
            return Ok(());
        }

        let dir_slash = if local_path.is_dir() { "/" } else { "" };
        let remote = match remote_path {
            Some(path) => path.display().to_string(),
            None => format!(
                "~/{}",
                local_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default()
            ),
        };

        let mut endpoints = vec![
            format!("{}{}", local_path.display(), dir_slash),
            format!("{}@{}:{}", self.user, public_ip, remote),
        ];
        if from_host {
            endpoints.reverse();
        }

        let filters: Vec<String> = include
            .iter()
            .map(|p| format!("--include {}", shell_words::quote(p)))
            .chain(
                exclude
                    .iter()
                    .map(|p| format!("--exclude {}", shell_words::quote(p))),
            )
            .collect();

        self.run(&format!(
            "rsync -rave \"ssh -p {port}\" --delete {filters} {endpoints}",
            port = self.host.ssh_port,
            filters = filters.join(" "),
            endpoints = endpoints.join(" "),
        ))
        .await?;
        Ok(())
    }

    /// Render a local template and upload the result.
    ///
    /// The run-wide `lock` serializes the shared `<file>.render` path across
    /// concurrent task instances; the rendered file is removed even when the
    /// upload fails.
    pub async fn upload_template(
        &self,
        lock: &Mutex<()>,
        local_path: &Path,
        remote_path: &Path,
        context: &Value,
    ) -> Result<(), SessionError> {
        if !local_path.exists() {
            return Err(SessionError::MissingTemplate {
                path: local_path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(local_path)?;

        let mut full_context = context.clone();
        if let Value::Object(map) = &mut full_context {
            map.entry("host".to_string())
                .or_insert_with(|| serde_json::to_value(&self.host).unwrap_or(Value::Null));
        }

        let _guard = lock.lock().await;
        let rendered = template::render(&text, &full_context)?;
        let render_path = local_path.with_extension(format!(
            "{}render",
            local_path
                .extension()
                .map(|e| format!("{}.", e.to_string_lossy()))
                .unwrap_or_default()
        ));
        std::fs::write(&render_path, rendered)?;

        let result = self
            .upload(&render_path, Some(remote_path), &[], &[], false)
            .await;
        if let Err(err) = std::fs::remove_file(&render_path) {
            warn!(path = %render_path.display(), %err, "failed to remove rendered template");
        }
        result
    }
}

/// Guard restoring the session's previous user on drop.
pub struct UserScope<'a> {
    session: &'a mut RemoteSession,
    saved: String,
}

impl Deref for UserScope<'_> {
    type Target = RemoteSession;

    fn deref(&self) -> &RemoteSession {
        self.session
    }
}

impl DerefMut for UserScope<'_> {
    fn deref_mut(&mut self) -> &mut RemoteSession {
        self.session
    }
}

impl Drop for UserScope<'_> {
    fn drop(&mut self) {
        self.session.user = std::mem::take(&mut self.saved);
    }
}

/// Guard restoring the session's previous command prefix on drop.
pub struct PrefixScope<'a> {
    session: &'a mut RemoteSession,
    saved: String,
}

impl Deref for PrefixScope<'_> {
    type Target = RemoteSession;

    fn deref(&self) -> &RemoteSession {
        self.session
    }
}

impl DerefMut for PrefixScope<'_> {
    fn deref_mut(&mut self) -> &mut RemoteSession {
        self.session
    }
}

impl Drop for PrefixScope<'_> {
    fn drop(&mut self) {
        self.session.prefix = std::mem::take(&mut self.saved);
    }
}
