use anyhow::Result;
use clap::Parser;

use logwarden_core::LogwardenConfig;
use logwarden_daemon::cli::DaemonCli;
use logwarden_daemon::logging;
use logwarden_daemon::orchestrator::{self, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = LogwardenConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);

    if cli.validate {
        orchestrator::validate_config(&config)?;
        println!("configuration is valid: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        config = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "logwarden-daemon starting"
    );

    let orchestrator = Orchestrator::build_from_config(config).await?;

    if cli.once {
        orchestrator.run_once().await?;
    } else {
        orchestrator.run().await?;
    }
    Ok(())
}
