//! Main entry point for the crm-data-extractor CLI

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crm_data_extractor::cli::{Cli, Commands};
use crm_data_extractor::metrics;
use crm_data_extractor::shutdown::{self, ShutdownCoordinator};

/// Initialize tracing subscriber with optional JSON formatting.
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crm_data_extractor=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Ctrl+C turns into a cooperative cancel so running extractions can
    // write their cancellation checkpoint before exiting.
    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - saving progress...");
                shutdown.request();
            }
        }
    });

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = metrics::init_metrics(addr) {
            error!(error = %e, "failed to initialize metrics exporter");
        }
    }

    let result = match &cli.command {
        Commands::Fetch(args) => args.execute(&cli).await.map_err(|e| anyhow::anyhow!(e)),
        Commands::Extract(args) => args
            .execute(&cli, shutdown.clone())
            .await
            .map_err(|e| anyhow::anyhow!(e)),
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        std::process::exit(1);
    }
}
