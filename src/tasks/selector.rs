//! Host selection.
//!
//! Given a task's visibility policy and the current inventory, returns the
//! ordered set of target hosts. The interactive single-host choice goes
//! through the injected operator prompt.

use std::fmt::Write as _;

use crate::prompt::OperatorPrompt;
use crate::tasks::error::TaskError;
use crate::tasks::registry::{HostPolicy, TaskDescriptor};
use crate::types::{Host, Inventory};

pub fn select_hosts(
    namespace: &str,
    descriptor: &TaskDescriptor,
    inventory: &Inventory,
    prompt: &dyn OperatorPrompt,
) -> Result<Vec<Host>, TaskError> {
    if descriptor.policy == HostPolicy::None {
        return Ok(vec![Host::synthetic()]);
    }

    let hosts = inventory.hosts_for(namespace);
    if hosts.is_empty() {
        return Err(TaskError::NoHosts {
            namespace: namespace.to_string(),
            task: descriptor.name.to_string(),
        });
    }

    match descriptor.policy {
        HostPolicy::First => Ok(hosts[..1].to_vec()),
        HostPolicy::One if hosts.len() > 1 => {
            let chosen = choose_host(hosts, prompt)?;
            Ok(vec![chosen])
        }
        _ => Ok(hosts.to_vec()),
    }
}

fn choose_host(hosts: &[Host], prompt: &dyn OperatorPrompt) -> Result<Host, TaskError> {
    let mut menu = String::new();
    for (index, host) in hosts.iter().enumerate() {
        let _ = writeln!(
            menu,
            " ({}) - {} [{}]",
            index + 1,
            host.name,
            host.public_ip.as_deref().unwrap_or("-")
        );
    }
    let answer = prompt.ask(&format!("{menu}Please choose host to run task: "))?;
    let choice: usize = answer
        .trim()
        .parse()
        .map_err(|_| TaskError::InvalidChoice {
            input: answer.clone(),
        })?;
    hosts
        .get(choice.wrapping_sub(1))
        .cloned()
        .ok_or(TaskError::InvalidChoice { input: answer })
}
