//! Main entry point for the table-csv-exporter CLI

use clap::Parser;
use table_csv_exporter::cli::{Cli, Commands};
use table_csv_exporter::metrics::init_metrics;
use table_csv_exporter::shutdown::{install_ctrl_c_handler, ShutdownCoordinator};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("table_csv_exporter=info"));

    // Logs go to stderr so stdout carries only the export summary
    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = init_metrics(addr) {
            warn!("Metrics disabled: {}", e);
        }
    }

    // Ctrl+C cancels the export through the handle passed to the executor
    let shutdown = ShutdownCoordinator::shared();
    install_ctrl_c_handler(shutdown.clone());

    let result = match cli.command {
        Commands::Export(ref args) => args.execute(&cli, shutdown.clone()).await,
    };

    match result {
        Ok(outcome) if outcome.is_success() => Ok(()),
        Ok(_) => std::process::exit(1),
        Err(e) => {
            error!("Command failed: {}", e);
            Err(anyhow::anyhow!(e))
        }
    }
}
