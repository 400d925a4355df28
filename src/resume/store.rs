//! File-backed checkpoint persistence
//!
//! The engine only talks to [`crate::extract::hooks::ControlHooks`]; this
//! module is one concrete backing for it, used by the CLI. Each job gets a
//! JSON checkpoint log written atomically (tempfile + rename) under an
//! advisory file lock, pruned to the most recent entries.

use async_trait::async_trait;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::extract::hooks::{ControlHooks, ResumePoint};
use crate::resume::checkpoint::{CheckpointError, CheckpointPayload};

/// Current checkpoint log schema version.
const SCHEMA_VERSION: &str = "1.0.0";

/// Maximum allowed log file size to prevent memory exhaustion on load.
pub const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Checkpoints retained per job; only the latest is needed for resume, the
/// rest are kept for diagnosis.
const MAX_CHECKPOINTS: usize = 20;

/// Persisted checkpoint history for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointLog {
    schema_version: String,
    job_id: String,
    checkpoints: Vec<CheckpointPayload>,
    created_at: i64,
    updated_at: i64,
}

impl CheckpointLog {
    /// Create an empty log for a job.
    pub fn new(job_id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            job_id: job_id.into(),
            checkpoints: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Job this log belongs to.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// All retained checkpoints, oldest first.
    pub fn checkpoints(&self) -> &[CheckpointPayload] {
        &self.checkpoints
    }

    /// Most recent checkpoint.
    pub fn latest(&self) -> Option<&CheckpointPayload> {
        self.checkpoints.last()
    }

    /// Append a checkpoint, pruning the history to [`MAX_CHECKPOINTS`].
    pub fn push(&mut self, checkpoint: CheckpointPayload) {
        debug!(
            phase = %checkpoint.phase,
            records_processed = checkpoint.records_processed,
            "appending checkpoint to log"
        );
        self.checkpoints.push(checkpoint);
        if self.checkpoints.len() > MAX_CHECKPOINTS {
            let drain = self.checkpoints.len() - MAX_CHECKPOINTS;
            self.checkpoints.drain(0..drain);
        }
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }

    /// Save the log with an atomic write under an exclusive file lock.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Io(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::Serialization(e.to_string()))?;

        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| CheckpointError::Lock(format!("failed to create lock file: {e}")))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| CheckpointError::Lock(format!("failed to acquire write lock: {e}")))?;

        let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
            .map_err(|e| CheckpointError::Io(format!("failed to create temp file: {e}")))?;
        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| CheckpointError::Io(format!("failed to write temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| CheckpointError::Io(format!("failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| CheckpointError::Io(format!("failed to sync temp file: {e}")))?;
        temp_file
            .persist(path)
            .map_err(|e| CheckpointError::Io(format!("failed to persist temp file: {e}")))?;

        debug!(
            path = %path.display(),
            checkpoints = self.checkpoints.len(),
            "checkpoint log saved"
        );
        Ok(())
    }

    /// Load a log, validating its size bound and schema version.
    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| CheckpointError::Lock(format!("failed to create lock file: {e}")))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .read()
            .map_err(|e| CheckpointError::Lock(format!("failed to acquire read lock: {e}")))?;

        let metadata = std::fs::metadata(path).map_err(|e| CheckpointError::Io(e.to_string()))?;
        if metadata.len() > MAX_LOG_FILE_SIZE {
            return Err(CheckpointError::LogTooLarge {
                size: metadata.len(),
                max: MAX_LOG_FILE_SIZE,
            });
        }

        let contents =
            std::fs::read_to_string(path).map_err(|e| CheckpointError::Io(e.to_string()))?;
        let log: CheckpointLog = serde_json::from_str(&contents).map_err(|e| {
            warn!(error = %e, "failed to deserialize checkpoint log");
            CheckpointError::Serialization(e.to_string())
        })?;

        if log.schema_version != SCHEMA_VERSION {
            return Err(CheckpointError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION.to_string(),
                found: log.schema_version,
            });
        }

        Ok(log)
    }
}

/// Per-job checkpoint store rooted in one directory.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Open (and create if needed) a store at `dir`.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| CheckpointError::Io(e.to_string()))?;
        Ok(Self { dir })
    }

    fn log_path(&self, job_id: &str) -> PathBuf {
        let safe: String = job_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    /// Append a checkpoint to the job's log.
    pub fn append(
        &self,
        job_id: &str,
        checkpoint: CheckpointPayload,
    ) -> Result<(), CheckpointError> {
        let path = self.log_path(job_id);
        let mut log = if path.exists() {
            CheckpointLog::load(&path)?
        } else {
            CheckpointLog::new(job_id)
        };
        log.push(checkpoint);
        log.save(&path)
    }

    /// Most recent checkpoint for a job, if any was ever written.
    pub fn latest(&self, job_id: &str) -> Result<Option<CheckpointPayload>, CheckpointError> {
        let path = self.log_path(job_id);
        if !path.exists() {
            return Ok(None);
        }
        let log = CheckpointLog::load(&path)?;
        Ok(log.latest().cloned())
    }

    /// Resume position recovered from the latest checkpoint, when it still
    /// carries a cursor.
    pub fn resume_point(&self, job_id: &str) -> Result<Option<ResumePoint>, CheckpointError> {
        let latest = self.latest(job_id)?;
        let point = latest.as_ref().and_then(ResumePoint::from_checkpoint);
        if let Some(point) = &point {
            info!(
                job_id,
                page_number = point.page_number,
                records_processed = point.records_processed,
                "resuming from checkpoint"
            );
        }
        Ok(point)
    }

    /// Remove a job's checkpoint log.
    pub fn clear(&self, job_id: &str) -> Result<(), CheckpointError> {
        let path = self.log_path(job_id);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| CheckpointError::Io(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ControlHooks for FileCheckpointStore {
    async fn save_checkpoint(
        &self,
        job_id: &str,
        checkpoint: &CheckpointPayload,
    ) -> Result<(), CheckpointError> {
        self.append(job_id, checkpoint.clone())
    }

    async fn should_cancel(&self, _job_id: &str) -> bool {
        false
    }

    async fn should_pause(&self, _job_id: &str) -> bool {
        false
    }
}
