//! Injected control hooks for the extraction engine
//!
//! Checkpoint persistence and the cancel/pause signals are external
//! collaborators. The engine only sees this trait, so hosts can back it
//! with a job database, a file store, or a test double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::resume::checkpoint::{CheckpointError, CheckpointPayload, CheckpointPhase};
use crate::shutdown::SharedShutdown;

/// Control surface polled by the extraction engine.
///
/// `should_cancel` is polled at page boundaries; `should_pause` at page
/// boundaries and between records within a page. Checkpoint persistence
/// failures are caught and logged by the engine, never propagated.
#[async_trait]
pub trait ControlHooks: Send + Sync {
    /// Persist one checkpoint for the given job.
    async fn save_checkpoint(
        &self,
        job_id: &str,
        checkpoint: &CheckpointPayload,
    ) -> Result<(), CheckpointError>;

    /// Whether the job has been asked to stop for good.
    async fn should_cancel(&self, job_id: &str) -> bool;

    /// Whether the job has been asked to pause.
    async fn should_pause(&self, job_id: &str) -> bool;
}

/// Hooks that persist nothing and never signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

#[async_trait]
impl ControlHooks for NoopHooks {
    async fn save_checkpoint(
        &self,
        _job_id: &str,
        _checkpoint: &CheckpointPayload,
    ) -> Result<(), CheckpointError> {
        Ok(())
    }

    async fn should_cancel(&self, _job_id: &str) -> bool {
        false
    }

    async fn should_pause(&self, _job_id: &str) -> bool {
        false
    }
}

/// Adapter that turns a process shutdown request into the cancel signal
/// while delegating everything else to the wrapped hooks.
///
/// Used by the CLI so Ctrl+C stops a run cooperatively through the same
/// path as a host-requested cancellation.
pub struct ShutdownCancelHooks<H> {
    inner: H,
    shutdown: SharedShutdown,
}

impl<H: ControlHooks> ShutdownCancelHooks<H> {
    /// Wrap `inner`, adding `shutdown` as a cancellation source.
    pub fn new(inner: H, shutdown: SharedShutdown) -> Self {
        Self { inner, shutdown }
    }
}

#[async_trait]
impl<H: ControlHooks> ControlHooks for ShutdownCancelHooks<H> {
    async fn save_checkpoint(
        &self,
        job_id: &str,
        checkpoint: &CheckpointPayload,
    ) -> Result<(), CheckpointError> {
        self.inner.save_checkpoint(job_id, checkpoint).await
    }

    async fn should_cancel(&self, job_id: &str) -> bool {
        self.shutdown.is_requested() || self.inner.should_cancel(job_id).await
    }

    async fn should_pause(&self, job_id: &str) -> bool {
        self.inner.should_pause(job_id).await
    }
}

/// Position a run restarts from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    /// Cursor of the next unread page; `None` means nothing is left.
    pub cursor: Option<String>,
    /// Fully consumed pages at the checkpoint.
    pub page_number: u64,
    /// Records emitted at the checkpoint.
    pub records_processed: u64,
}

impl ResumePoint {
    /// Derive a resume point from a persisted checkpoint.
    ///
    /// Only checkpoints that still carry a cursor yield a resume point; a
    /// completed run (or a fresh one) restarts from scratch instead, which
    /// is what the cursor-as-source-of-truth contract requires.
    pub fn from_checkpoint(checkpoint: &CheckpointPayload) -> Option<Self> {
        if checkpoint.phase == CheckpointPhase::Completed {
            return None;
        }
        checkpoint.cursor.as_ref()?;
        Some(Self {
            cursor: checkpoint.cursor.clone(),
            page_number: checkpoint.page_number,
            records_processed: checkpoint.records_processed,
        })
    }
}
