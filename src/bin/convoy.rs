use anyhow::Result;
use clap::Parser;
use convoy::cli::{init_tracing, ConvoyCli};
use convoy::config::load_config;
use convoy::manager::DeployManager;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ConvoyCli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli.config)?;
    let mut manager = DeployManager::new(config);
    manager.set_force(cli.force);
    manager.set_verbose(cli.verbose);

    match manager.run(&cli.commands).await {
        Ok(Some(output)) if !output.is_empty() => {
            println!("{output}");
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    }
}
