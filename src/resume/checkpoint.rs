//! Checkpoint payload types
//!
//! A checkpoint fully determines resumption state: `(cursor, page_number,
//! records_processed)` is sufficient to restart a run without loss, with the
//! documented exception that a mid-page pause resumes at the start of the
//! same page (bounded at-least-once re-emission).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::extract::config::SOURCE_SERVICE;

/// Extraction phase recorded on a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointPhase {
    /// Periodic progress checkpoint between pages.
    #[serde(rename = "main_data")]
    MainData,
    /// Paused at a page boundary; cursor points at the next unread page.
    #[serde(rename = "main_data_paused")]
    Paused,
    /// Paused inside a page; cursor points at the page in progress.
    #[serde(rename = "main_data_paused_mid_page")]
    PausedMidPage,
    /// Cancelled before fetching another page.
    #[serde(rename = "main_data_cancelled")]
    Cancelled,
    /// Extraction finished; no cursor remains.
    #[serde(rename = "main_data_completed")]
    Completed,
    /// A page fetch failed; carries the recovery cursor.
    #[serde(rename = "main_data_error")]
    Error,
}

impl CheckpointPhase {
    /// Wire name of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointPhase::MainData => "main_data",
            CheckpointPhase::Paused => "main_data_paused",
            CheckpointPhase::PausedMidPage => "main_data_paused_mid_page",
            CheckpointPhase::Cancelled => "main_data_cancelled",
            CheckpointPhase::Completed => "main_data_completed",
            CheckpointPhase::Error => "main_data_error",
        }
    }
}

impl fmt::Display for CheckpointPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One checkpoint handed to the persistence callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointPayload {
    /// Phase this checkpoint was taken in.
    pub phase: CheckpointPhase,
    /// Records emitted so far across the whole run.
    pub records_processed: u64,
    /// Cursor needed to continue; `None` when the collection is exhausted.
    pub cursor: Option<String>,
    /// Fully consumed pages so far.
    pub page_number: u64,
    /// Page size the run was fetching with.
    pub batch_size: u32,
    /// Phase-specific detail block.
    pub checkpoint_data: CheckpointDetails,
}

/// Phase-specific checkpoint details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckpointDetails {
    /// Periodic progress.
    Progress {
        /// Pages consumed so far.
        pages_processed: u64,
        /// Records in the most recently consumed page.
        last_page_records: u64,
        /// Source-service tag.
        service: String,
    },
    /// Page-boundary pause.
    Paused {
        /// Why the run paused.
        pause_reason: String,
        /// Page count at the pause.
        paused_at_page: u64,
        /// Instant of the pause.
        paused_at: DateTime<Utc>,
        /// Source-service tag.
        service: String,
    },
    /// Mid-page pause.
    PausedMidPage {
        /// Why the run paused.
        pause_reason: String,
        /// Page count at the pause.
        paused_at_page: u64,
        /// Records already emitted from the in-flight page.
        records_completed_in_page: u64,
        /// Instant of the pause.
        paused_at: DateTime<Utc>,
        /// Source-service tag.
        service: String,
    },
    /// Cooperative cancellation.
    Cancelled {
        /// Why the run was cancelled.
        cancellation_reason: String,
        /// Page count at the cancellation.
        cancelled_at_page: u64,
        /// Source-service tag.
        service: String,
    },
    /// Successful completion.
    Completed {
        /// Completion marker.
        completion_status: String,
        /// Total pages consumed.
        total_pages: u64,
        /// Total records emitted.
        final_total: u64,
        /// Source-service tag.
        service: String,
    },
    /// Fatal page-fetch failure.
    Error {
        /// Rendered error message.
        error: String,
        /// 1-based page the fetch failed on.
        error_page: u64,
        /// Cursor to retry the failed page from.
        recovery_cursor: Option<String>,
        /// Source-service tag.
        service: String,
    },
}

impl CheckpointPayload {
    /// Periodic progress checkpoint; `cursor` is the next unread page.
    pub fn progress(
        records_processed: u64,
        cursor: Option<String>,
        page_number: u64,
        batch_size: u32,
        last_page_records: u64,
    ) -> Self {
        Self {
            phase: CheckpointPhase::MainData,
            records_processed,
            cursor,
            page_number,
            batch_size,
            checkpoint_data: CheckpointDetails::Progress {
                pages_processed: page_number,
                last_page_records,
                service: SOURCE_SERVICE.to_string(),
            },
        }
    }

    /// Page-boundary pause checkpoint; `cursor` is the next unread page.
    pub fn paused(
        records_processed: u64,
        cursor: Option<String>,
        page_number: u64,
        batch_size: u32,
    ) -> Self {
        Self {
            phase: CheckpointPhase::Paused,
            records_processed,
            cursor,
            page_number,
            batch_size,
            checkpoint_data: CheckpointDetails::Paused {
                pause_reason: "user_requested".to_string(),
                paused_at_page: page_number,
                paused_at: Utc::now(),
                service: SOURCE_SERVICE.to_string(),
            },
        }
    }

    /// Mid-page pause checkpoint; `cursor` refetches the in-flight page, so
    /// its first `records_completed_in_page` records will be re-emitted on
    /// resume.
    pub fn paused_mid_page(
        records_processed: u64,
        cursor: Option<String>,
        page_number: u64,
        batch_size: u32,
        records_completed_in_page: u64,
    ) -> Self {
        Self {
            phase: CheckpointPhase::PausedMidPage,
            records_processed,
            cursor,
            page_number,
            batch_size,
            checkpoint_data: CheckpointDetails::PausedMidPage {
                pause_reason: "user_requested_mid_page".to_string(),
                paused_at_page: page_number,
                records_completed_in_page,
                paused_at: Utc::now(),
                service: SOURCE_SERVICE.to_string(),
            },
        }
    }

    /// Cancellation checkpoint.
    pub fn cancelled(
        records_processed: u64,
        cursor: Option<String>,
        page_number: u64,
        batch_size: u32,
    ) -> Self {
        Self {
            phase: CheckpointPhase::Cancelled,
            records_processed,
            cursor,
            page_number,
            batch_size,
            checkpoint_data: CheckpointDetails::Cancelled {
                cancellation_reason: "user_requested".to_string(),
                cancelled_at_page: page_number,
                service: SOURCE_SERVICE.to_string(),
            },
        }
    }

    /// Final checkpoint on successful completion.
    pub fn completed(records_processed: u64, page_number: u64, batch_size: u32) -> Self {
        Self {
            phase: CheckpointPhase::Completed,
            records_processed,
            cursor: None,
            page_number,
            batch_size,
            checkpoint_data: CheckpointDetails::Completed {
                completion_status: "success".to_string(),
                total_pages: page_number,
                final_total: records_processed,
                service: SOURCE_SERVICE.to_string(),
            },
        }
    }

    /// Error checkpoint recorded before propagating a fetch failure.
    pub fn error(
        records_processed: u64,
        cursor: Option<String>,
        page_number: u64,
        batch_size: u32,
        message: String,
    ) -> Self {
        let recovery_cursor = cursor.clone();
        Self {
            phase: CheckpointPhase::Error,
            records_processed,
            cursor,
            page_number,
            batch_size,
            checkpoint_data: CheckpointDetails::Error {
                error: message,
                error_page: page_number + 1,
                recovery_cursor,
                service: SOURCE_SERVICE.to_string(),
            },
        }
    }
}

/// Errors from checkpoint persistence.
///
/// The extraction engine always catches these, logs them, and keeps going;
/// they are never allowed to abort a run.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// File lock error
    #[error("lock error: {0}")]
    Lock(String),

    /// Log schema version mismatch
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// Log file exceeds the size bound
    #[error("checkpoint log too large: {size} bytes (max: {max} bytes)")]
    LogTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// Store-defined failure
    #[error("checkpoint store error: {0}")]
    Store(String),
}
