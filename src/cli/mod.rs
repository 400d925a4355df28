//! CLI command implementations

use clap::{Parser, Subcommand};
use std::net::SocketAddr;

pub mod error;
pub mod extract;
pub mod fetch;

pub use error::CliError;
pub use extract::ExtractArgs;
pub use fetch::FetchArgs;

/// Checkpointed, resumable CRM data extractor.
#[derive(Debug, Parser)]
#[command(name = "crm-data-extractor", version, about)]
pub struct Cli {
    /// API base URL override.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Expose Prometheus metrics on this address (e.g. 127.0.0.1:9090).
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch a single page of deals and print it (smoke test).
    Fetch(FetchArgs),
    /// Run a full checkpointed extraction to an NDJSON file.
    Extract(ExtractArgs),
}

/// Resolve the access token from a flag value or the environment.
pub(crate) fn resolve_token(flag: Option<&str>) -> Result<String, CliError> {
    if let Some(token) = flag {
        return Ok(token.to_string());
    }
    std::env::var("CRM_ACCESS_TOKEN").map_err(|_| {
        CliError::Configuration(
            "provide --token or set the CRM_ACCESS_TOKEN environment variable".to_string(),
        )
    })
}
