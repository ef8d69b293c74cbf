use clap::Parser;
use datadic::{
    load_ingestion_config, logging, CommandTransformer, IngestionService, ReingestionScheduler,
    SledDocumentStore,
};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about = "Long-running ingestion node", long_about = None)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(short, long, env = "DATADIC_CONFIG", default_value = "config/datadic.toml")]
    config: PathBuf,

    /// Drop and rebuild every collection before the scheduler starts
    #[arg(long)]
    reingest: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_ingestion_config(Some(&cli.config))?;
    logging::init(&config.log_level)?;

    info!("Opening store at {}", config.storage_path.display());
    let store = Arc::new(SledDocumentStore::open(&config.storage_path)?);
    let transformer = Arc::new(CommandTransformer::for_config(&config));
    let service = Arc::new(IngestionService::new(store, transformer, config.layout()));

    if cli.reingest {
        info!("Re-ingesting from scratch...");
        match service.run_ingestion(true).await {
            Ok(report) => info!("Startup ingestion {} finished", report.run_id),
            Err(e) => {
                error!("Startup ingestion failed: {}", e);
                return Err(e.into());
            }
        }
    }

    let scheduler = Arc::new(ReingestionScheduler::new(
        service,
        config.reingest_interval(),
    ));
    let handle = scheduler.start();
    info!("Node running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    handle.stop().await;
    Ok(())
}
