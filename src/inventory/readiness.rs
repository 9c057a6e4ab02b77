//! SSH readiness probing and known-hosts maintenance.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::inventory::error::ProviderError;
use crate::session::run_local;
use crate::types::Host;

/// Probing seam injected into the reconciler so convergence is testable
/// without opening sockets or touching `~/.ssh`.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Block until the host accepts TCP connections on its ssh port.
    async fn wait_ready(&self, host: &Host) -> Result<(), ProviderError>;

    /// Refresh `known_hosts` entries for the given addresses after a
    /// topology change.
    async fn refresh_keys(&self, addresses: &[String]) -> Result<(), ProviderError>;
}

/// Default probe: bounded TCP connect attempts with a short fixed backoff,
/// then `ssh-keyscan` into the operator's known-hosts file.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            attempts: 20,
            backoff: Duration::from_secs(1),
        }
    }
}

#[async_trait]
impl ReadinessProbe for TcpProbe {
    async fn wait_ready(&self, host: &Host) -> Result<(), ProviderError> {
        let address = host.public_ip.clone().ok_or_else(|| ProviderError::Backend {
            provider: host.provider.clone().unwrap_or_default(),
            reason: format!("host {} has no public address to probe", host.name),
        })?;
        let endpoint = format!("{}:{}", address, host.ssh_port);

        for attempt in 1..=self.attempts {
            match tokio::time::timeout(
                Duration::from_secs(1),
                tokio::net::TcpStream::connect(&endpoint),
            )
            .await
            {
                Ok(Ok(_)) => {
                    debug!(host = %host.name, %endpoint, attempt, "ssh port reachable");
                    return Ok(());
                }
                Ok(Err(err)) => {
                    debug!(host = %host.name, attempt, %err, "ssh probe refused");
                }
                Err(_) => {
                    debug!(host = %host.name, attempt, "ssh probe timed out");
                }
            }
            tokio::time::sleep(self.backoff).await;
        }

        Err(ProviderError::ReadinessTimeout {
            host: host.name.clone(),
            attempts: self.attempts,
        })
    }

    async fn refresh_keys(&self, addresses: &[String]) -> Result<(), ProviderError> {
        if addresses.is_empty() {
            return Ok(());
        }
        let known_hosts = dirs::home_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join(".ssh")
            .join("known_hosts");

        // Drop stale entries for the affected addresses before rescanning.
        if known_hosts.exists() {
            let text = std::fs::read_to_string(&known_hosts)?;
            std::fs::write(&known_hosts, prune_known_hosts(&text, addresses))?;
        }

        info!(count = addresses.len(), "refreshing ssh known-hosts entries");
        for address in addresses {
            if let Err(err) = run_local(
                &format!("ssh-keyscan {} >> {}", address, known_hosts.display()),
                false,
            )
            .await
            {
                warn!(%address, %err, "ssh-keyscan failed");
            }
        }
        Ok(())
    }
}

/// Drop known-hosts lines whose host field names one of `addresses`.
///
/// The host field is the first whitespace-separated token and may list
/// several comma-separated names, each plain (`10.0.0.1`) or bracketed with
/// a port (`[10.0.0.1]:2222`). Matching is exact per name, so refreshing
/// `10.0.0.1` leaves `10.0.0.10` alone.
fn prune_known_hosts(text: &str, addresses: &[String]) -> String {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| {
            let field = line.split_whitespace().next().unwrap_or("");
            !field.split(',').any(|entry| {
                addresses.iter().any(|ip| {
                    entry == ip
                        || entry
                            .strip_prefix('[')
                            .and_then(|rest| rest.strip_prefix(ip.as_str()))
                            .is_some_and(|rest| rest.starts_with("]:"))
                })
            })
        })
        .collect();
    format!("{}\n", kept.join("\n"))
}

/// Probe that reports every host ready and touches nothing; used by tests
/// and dry wiring.
#[derive(Debug, Default)]
pub struct NoopProbe;

#[async_trait]
impl ReadinessProbe for NoopProbe {
    async fn wait_ready(&self, _host: &Host) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn refresh_keys(&self, _addresses: &[String]) -> Result<(), ProviderError> {
        Ok(())
    }
}
