//! Data Acquisition Service (`datasrv`)

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use datasrv::config::{self, AppConfig};
use datasrv::connectors::default_registry;
use datasrv::error::Result;
use datasrv::manager::DataManager;

#[derive(Parser, Debug)]
#[command(name = "datasrv", about = "Energy monitoring data acquisition service", version)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "DATASRV_CONFIG", default_value = "datasrv.yaml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    validate: bool,

    /// Log filter, e.g. `info` or `datasrv=debug`
    #[arg(long, env = "DATASRV_LOG", default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log))
        .init();

    info!("Loading configuration from {}", args.config.display());
    let config = AppConfig::load(&args.config)?;

    if args.validate {
        config::validate(&config)?;
        info!(
            "Configuration is valid: {} connector(s), {} channel(s)",
            config.connectors.len(),
            config.channels.len()
        );
        return Ok(());
    }

    let manager = Arc::new(DataManager::new(default_registry()?));
    manager.configure(&config).await?;
    manager.activate()?;
    manager.connect(None).await?;

    // Ctrl-C requests a clean stop; the loop flushes pending log data on the
    // way out.
    let interrupter = manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupter.interrupt();
        }
    });

    if let Err(e) = manager.run().await {
        error!("Acquisition loop failed: {e}");
    }
    manager.deactivate().await;
    info!("Shutdown complete");
    Ok(())
}
