use clap::{Parser, Subcommand, ValueEnum};
use datadic::{
    load_ingestion_config, logging, CommandTransformer, InboundWriter, IngestionConfig,
    IngestionService, ListSource, RecordKind, ReingestionScheduler, SledDocumentStore, ValueKind,
};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "DATADIC_CONFIG", default_value = "config/datadic.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    Entity,
    Collection,
}

impl From<Kind> for RecordKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Entity => RecordKind::Entity,
            Kind::Collection => RecordKind::Collection,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    /// Ingested records
    Existing,
    /// Inbound plain-text submissions
    Text,
    /// Inbound markup submissions
    Html,
}

impl From<Source> for ListSource {
    fn from(source: Source) -> Self {
        match source {
            Source::Existing => ListSource::Existing,
            Source::Text => ListSource::Text,
            Source::Html => ListSource::Html,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the transform step and load its output
    Ingest {
        /// Drop every derived and canonical collection first
        #[arg(long)]
        clear: bool,
    },
    /// Submit a record file through the write path
    Submit {
        /// Path to the record JSON file
        #[arg(required = true)]
        path: PathBuf,
        /// The record's values are rich markup
        #[arg(long)]
        html: bool,
    },
    /// List record names
    List {
        #[arg(value_enum)]
        kind: Kind,
        #[arg(value_enum, default_value = "existing")]
        source: Source,
    },
}

fn scheduler(config: &IngestionConfig) -> Result<Arc<ReingestionScheduler>, Box<dyn std::error::Error>> {
    let store = Arc::new(SledDocumentStore::open(&config.storage_path)?);
    let transformer = Arc::new(CommandTransformer::for_config(config));
    let service = Arc::new(IngestionService::new(store, transformer, config.layout()));
    Ok(Arc::new(ReingestionScheduler::new(
        service,
        config.reingest_interval(),
    )))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_ingestion_config(Some(&cli.config))?;
    logging::init(&config.log_level).ok();
    let scheduler = scheduler(&config)?;

    match cli.command {
        Commands::Ingest { clear } => {
            let report = scheduler.service().run_ingestion(clear).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Submit { path, html } => {
            let payload = fs::read(&path)?;
            let value_kind = if html { ValueKind::Html } else { ValueKind::Text };
            info!("Submitting {}", path.display());
            let receipt = InboundWriter::new(scheduler).submit(&payload, value_kind).await?;
            println!(
                "{} [{}] staged at {}",
                receipt.kind,
                receipt.entity,
                receipt.staged.display()
            );
        }
        Commands::List { kind, source } => {
            for name in scheduler.list_names(kind.into(), source.into())? {
                println!("{}", name);
            }
        }
    }
    Ok(())
}
