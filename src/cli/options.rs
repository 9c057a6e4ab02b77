use clap::Parser;
use std::path::PathBuf;

/// Deployment orchestration over SSH: reconcile hosts, run component tasks.
#[derive(Parser)]
#[command(name = "convoy")]
#[command(about = "Reconcile cloud hosts and run composable deployment tasks over SSH")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct ConvoyCli {
    /// Environment configuration file (YAML)
    pub config: PathBuf,

    /// Commands to run, each "namespace.task[:arg,arg]"
    pub commands: Vec<String>,

    /// Invalidate the host cache before reconciliation
    #[arg(short, long)]
    pub force: bool,

    /// Echo every remote command as it runs
    #[arg(short, long)]
    pub verbose: bool,
}
