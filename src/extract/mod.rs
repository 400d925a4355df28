//! Extraction engine and supporting pieces
//!
//! # Overview
//!
//! One extraction run walks the paginated collection page by page:
//!
//! 1. **Job**: what to extract and under which identity ([`job::ExtractionJob`])
//! 2. **Engine**: the pausable, cancellable, checkpointable pagination state
//!    machine ([`engine::ExtractionEngine`])
//! 3. **Mapping**: raw payloads normalized to flat records ([`mapper::RecordMapper`])
//! 4. **Hooks**: checkpoint persistence and control signals injected by the
//!    host ([`hooks::ControlHooks`])
//!
//! The engine is a pull-based sequence: each `next_record().await` returns
//! one record, and the run can stop cooperatively between any two of them.

use crate::client::ApiError;

pub mod config;
pub mod engine;
pub mod hooks;
pub mod job;
pub mod mapper;

pub use engine::{EngineState, ExtractionEngine, RecordStream};
pub use hooks::{ControlHooks, NoopHooks, ResumePoint, ShutdownCancelHooks};
pub use job::ExtractionJob;
pub use mapper::RecordMapper;

/// Extraction errors.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Invalid job parameters; raised before any network activity.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A page fetch failed after the client exhausted its retries.
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}
