//! `extract` subcommand: run a full checkpointed extraction

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::{resolve_token, Cli, CliError};
use crate::client::{CrmClientConfig, CrmHttpClient};
use crate::extract::{
    ControlHooks, EngineState, ExtractionEngine, ExtractionJob, NoopHooks, ResumePoint,
    ShutdownCancelHooks,
};
use crate::output::{NdjsonWriter, RecordWriter};
use crate::resume::FileCheckpointStore;
use crate::shutdown::SharedShutdown;

/// Arguments for the `extract` command.
#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Access token; falls back to CRM_ACCESS_TOKEN.
    #[arg(long)]
    pub token: Option<String>,

    /// Scan/job identifier.
    #[arg(long)]
    pub scan_id: String,

    /// Owning organization identifier.
    #[arg(long)]
    pub organization_id: String,

    /// Page size (1-100).
    #[arg(long, default_value_t = 100)]
    pub page_size: u32,

    /// Output NDJSON file.
    #[arg(long)]
    pub output: PathBuf,

    /// Directory for checkpoint logs; enables resume across invocations.
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// Restrict output to these top-level properties (repeatable).
    #[arg(long = "property")]
    pub properties: Vec<String>,

    /// Endpoint override: relative path or absolute URL.
    #[arg(long)]
    pub endpoint: Option<String>,
}

impl ExtractArgs {
    /// Run the extraction until it completes, pauses, is cancelled, or
    /// fails.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let token = resolve_token(self.token.as_deref())?;

        let mut config = CrmClientConfig::default();
        if let Some(base_url) = &cli.base_url {
            config = config.with_base_url(base_url.clone());
        }
        let client = Arc::new(CrmHttpClient::new(token, config)?);

        let mut job = ExtractionJob::new(self.scan_id.as_str(), self.organization_id.as_str())
            .with_page_size(self.page_size);
        if !self.properties.is_empty() {
            job = job.with_properties(self.properties.clone());
        }
        if let Some(endpoint) = &self.endpoint {
            job = job.with_endpoint(endpoint.clone());
        }

        let (hooks, resume): (Arc<dyn ControlHooks>, Option<ResumePoint>) =
            match &self.checkpoint_dir {
                Some(dir) => {
                    let store = FileCheckpointStore::new(dir.clone())?;
                    let resume = store.resume_point(&self.scan_id)?;
                    (
                        Arc::new(ShutdownCancelHooks::new(store, shutdown.clone())),
                        resume,
                    )
                }
                None => (
                    Arc::new(ShutdownCancelHooks::new(NoopHooks, shutdown.clone())),
                    None,
                ),
            };

        let mut engine = ExtractionEngine::new(client, job, hooks)?.with_resume(resume);
        let mut writer = NdjsonWriter::create(&self.output)?;

        while let Some(item) = engine.next_record().await {
            match item {
                Ok(record) => writer.write_record(&record)?,
                Err(e) => {
                    // Progress written so far stays on disk for diagnosis
                    writer.flush()?;
                    return Err(e.into());
                }
            }
        }
        writer.close()?;

        let records = engine.records_processed();
        match engine.state() {
            EngineState::Completed => {
                info!(records, output = %self.output.display(), "extraction completed");
            }
            EngineState::Paused | EngineState::PausedMidPage => {
                info!(records, "extraction paused; rerun with the same --checkpoint-dir to resume");
            }
            EngineState::Cancelled => {
                warn!(records, "extraction cancelled");
            }
            state => {
                warn!(records, ?state, "extraction stopped");
            }
        }
        Ok(())
    }
}
