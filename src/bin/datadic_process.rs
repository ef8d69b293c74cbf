//! The transform executable invoked by ingestion runs.
//!
//! Without arguments it processes the renamed corpus into `out` and `err`.
//! `--whole` first rebuilds the renamed corpus from `original`.

use clap::Parser;
use datadic::{load_ingestion_config, logging, run_pipeline, DataLayout, PipelineOptions};
use log::{error, info};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Rename source files from `original` before processing
    #[arg(long)]
    whole: bool,

    /// TOML configuration file, shared with the node
    #[arg(short, long, env = "DATADIC_CONFIG", default_value = "config/datadic.toml")]
    config: PathBuf,

    /// Root of the data tree, overriding the configuration
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Identifier padding width, overriding the configuration
    #[arg(long)]
    identifier_width: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_ingestion_config(Some(&cli.config))?;
    logging::init(&config.log_level).ok();

    let layout = match cli.data_root {
        Some(root) => DataLayout::new(root),
        None => config.layout(),
    };
    let options = PipelineOptions {
        whole: cli.whole,
        identifier_width: cli.identifier_width.unwrap_or(config.identifier_width),
    };

    info!("processing {} (whole: {})", layout.root().display(), options.whole);
    match run_pipeline(&layout, options) {
        Ok(report) => {
            println!(
                "entities: {} repaired, {} quarantined; collections: {} repaired, {} quarantined",
                report.entities.repaired,
                report.entities.quarantined.len(),
                report.collections.repaired,
                report.collections.quarantined.len()
            );
            for path in report
                .entities
                .quarantined
                .iter()
                .chain(report.collections.quarantined.iter())
            {
                println!("quarantined: {}", path.display());
            }
            Ok(())
        }
        Err(e) => {
            error!("processing failed: {}", e);
            Err(e.into())
        }
    }
}
