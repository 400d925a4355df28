//! # CRM Data Extractor Library
//!
//! A checkpointed, resumable extractor for paginated CRM APIs. Pulls deal
//! records page by page from the CRM's REST API, normalizes them into a flat
//! record schema, and streams them to a downstream consumer while tolerating
//! cancellation, pausing, and transient failures.
//!
//! ## Features
//!
//! - **Rate Limiting**: Process-local sliding-window budget applied before
//!   every request attempt
//! - **Robust Retries**: Exponential backoff with jitter; server-provided
//!   `Retry-After` honored on 429 responses
//! - **Error Classification**: Auth, rate-limit, server, and network
//!   failures are distinguished, with retries only where they help
//! - **Checkpointing**: Periodic and event-driven checkpoints capture the
//!   exact cursor/page/record position needed to resume
//! - **Pause / Cancel**: Cooperative signals honored between pages and
//!   between records within a page
//! - **Streaming**: Records are emitted one at a time, never buffered into
//!   memory as a whole collection
//!
//! ## Quick Start
//!
//! ```no_run
//! use crm_data_extractor::client::{CrmClientConfig, CrmHttpClient};
//! use crm_data_extractor::extract::{ExtractionEngine, ExtractionJob, NoopHooks};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CrmHttpClient::new("<ACCESS_TOKEN>", CrmClientConfig::default())?;
//! let job = ExtractionJob::new("scan-42", "org-7").with_page_size(100);
//! let mut engine = ExtractionEngine::new(Arc::new(client), job, Arc::new(NoopHooks))?;
//!
//! while let Some(record) = engine.next_record().await {
//!     let record = record?;
//!     println!("{}", serde_json::to_string(&record)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`client`] - rate-limited, retrying HTTP client with response
//!   classification
//! - [`extract`] - the pagination engine, record mapper, and control hooks
//! - [`resume`] - checkpoint payloads and a file-backed store
//! - [`output`] - record writers for streaming results to disk
//! - [`shutdown`] - cooperative shutdown shared with the CLI
//! - [`metrics`] - optional Prometheus observability

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

/// CLI command implementations
pub mod cli;

/// Rate-limited CRM API client
pub mod client;

/// Extraction engine, mapper, and control hooks
pub mod extract;

/// Observability metrics
pub mod metrics;

/// Record output writers
pub mod output;

/// Checkpoint payloads and persistence
pub mod resume;

/// Cooperative shutdown coordination
pub mod shutdown;

// Re-export commonly used types
pub use client::{ApiError, CrmClientConfig, CrmHttpClient};
pub use extract::{EngineState, ExtractError, ExtractionEngine, ExtractionJob};
pub use resume::{CheckpointPayload, CheckpointPhase};

/// Extraction metadata attached to every mapped record.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExtractionMeta {
    /// UTC instant the record was mapped.
    #[serde(rename = "_extracted_at")]
    pub extracted_at: DateTime<Utc>,
    /// Scan/job id this record was extracted under.
    #[serde(rename = "_scan_id")]
    pub scan_id: String,
    /// Owning organization.
    #[serde(rename = "_organization_id")]
    pub organization_id: String,
    /// Tenant id; mirrors the organization id.
    #[serde(rename = "_tenant_id")]
    pub tenant_id: String,
    /// 1-based page the record came from.
    #[serde(rename = "_page_number")]
    pub page_number: u64,
    /// Fixed source-service tag.
    #[serde(rename = "_source_service")]
    pub source_service: String,
}

/// Flat deal record produced by the default schema mapping.
///
/// Field coercions degrade to `None` on malformed input; mapping never
/// fails a whole record because one field would not parse.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DealRecord {
    /// Source record identifier.
    pub hubspot_deal_id: Option<String>,
    /// Deal name.
    pub dealname: Option<String>,
    /// Deal amount.
    pub amount: Option<Decimal>,
    /// Pipeline stage.
    pub dealstage: Option<String>,
    /// Pipeline identifier.
    pub pipeline: Option<String>,
    /// Expected close date, normalized to UTC.
    pub closedate: Option<DateTime<Utc>>,
    /// Creation date, normalized to UTC.
    pub createdate: Option<DateTime<Utc>>,
    /// Last modification date, normalized to UTC.
    pub hs_lastmodifieddate: Option<DateTime<Utc>>,
    /// Internal object id property.
    pub hs_object_id: Option<String>,
    /// Archived flag; defaults to `false` when absent.
    pub archived: bool,
    /// Extraction metadata.
    #[serde(flatten)]
    pub meta: ExtractionMeta,
}

/// One mapped output record.
///
/// Either the typed default-schema mapping or a dynamic projection produced
/// by a property allow-list. Both serialize to a flat JSON object.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MappedRecord {
    /// Default-schema deal record.
    Deal(Box<DealRecord>),
    /// Allow-list projection plus metadata.
    Filtered(Map<String, Value>),
}

impl MappedRecord {
    /// Scan id stamped on the record, when present.
    pub fn scan_id(&self) -> Option<&str> {
        match self {
            MappedRecord::Deal(deal) => Some(&deal.meta.scan_id),
            MappedRecord::Filtered(map) => map.get("_scan_id").and_then(Value::as_str),
        }
    }

    /// 1-based page number stamped on the record, when present.
    pub fn page_number(&self) -> Option<u64> {
        match self {
            MappedRecord::Deal(deal) => Some(deal.meta.page_number),
            MappedRecord::Filtered(map) => map.get("_page_number").and_then(Value::as_u64),
        }
    }
}
