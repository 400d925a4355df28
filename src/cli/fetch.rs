//! `fetch` subcommand: retrieve one page of deals and print it

use clap::Args;
use tracing::info;

use crate::cli::{resolve_token, Cli, CliError};
use crate::client::{CrmClientConfig, CrmHttpClient};

/// Arguments for the `fetch` smoke-test command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Access token; falls back to CRM_ACCESS_TOKEN.
    #[arg(long)]
    pub token: Option<String>,

    /// Page size (1-100).
    #[arg(long, default_value_t = 100)]
    pub limit: u32,

    /// Cursor to start from.
    #[arg(long)]
    pub after: Option<String>,

    /// Relative endpoint path or absolute URL.
    #[arg(long)]
    pub path: Option<String>,
}

impl FetchArgs {
    /// Fetch one page and print it as pretty JSON.
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let token = resolve_token(self.token.as_deref())?;

        let mut config = CrmClientConfig::default();
        if let Some(base_url) = &cli.base_url {
            config = config.with_base_url(base_url.clone());
        }
        let client = CrmHttpClient::new(token, config)?;

        let page = client
            .fetch_deals(self.limit, self.after.as_deref(), None, self.path.as_deref())
            .await?;

        info!(
            records = page.results.len(),
            has_next = page.forward_cursor().is_some(),
            "page fetched"
        );
        let rendered = serde_json::to_string_pretty(&page)
            .map_err(|e| CliError::InvalidArgument(format!("failed to render page: {e}")))?;
        println!("{rendered}");
        Ok(())
    }
}
