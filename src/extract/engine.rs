//! Pull-based pagination state machine
//!
//! Each call to [`ExtractionEngine::next_record`] advances the internal
//! state (cursor, counters, in-flight page) and yields one mapped record,
//! a propagated error, or end-of-stream. Cancellation and pause are
//! cooperative signals polled at page boundaries and between records; they
//! are never preemptive, so a page fetch in flight always finishes or fails
//! on its own.
//!
//! Checkpoint semantics: page-boundary checkpoints carry the cursor of the
//! next unread page, so resuming never refetches a fully consumed page. A
//! mid-page pause checkpoint carries the cursor of the page in progress, so
//! that page is refetched and re-emitted from its start on resume - an
//! accepted at-least-once window bounded by one page.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::Stream;
use std::pin::Pin;
use tracing::{debug, error, info, warn};

use crate::client::response::RawDeal;
use crate::client::CrmHttpClient;
use crate::extract::config::{CHECKPOINT_INTERVAL_PAGES, MAX_PAGES};
use crate::extract::hooks::{ControlHooks, ResumePoint};
use crate::extract::job::ExtractionJob;
use crate::extract::mapper::RecordMapper;
use crate::extract::ExtractError;
use crate::metrics;
use crate::resume::checkpoint::CheckpointPayload;
use crate::MappedRecord;

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Actively paginating.
    Fetching,
    /// Stopped at a page boundary on a pause signal; resumable.
    Paused,
    /// Stopped inside a page on a pause signal; resumable with bounded
    /// re-emission.
    PausedMidPage,
    /// Stopped on a cancel signal.
    Cancelled,
    /// Ran out of pages (or hit the page safety cap).
    Completed,
    /// A page fetch failed after the client's retries were exhausted.
    Failed,
}

/// Boxed stream of mapped records.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<MappedRecord, ExtractError>> + Send>>;

/// Pagination metadata of the page currently being drained.
struct PageInFlight {
    next_cursor: Option<String>,
}

/// Checkpointed, pausable pagination engine for one extraction run.
pub struct ExtractionEngine {
    client: Arc<CrmHttpClient>,
    job: ExtractionJob,
    hooks: Arc<dyn ControlHooks>,
    mapper: RecordMapper,
    state: EngineState,
    cursor: Option<String>,
    pages_processed: u64,
    records_processed: u64,
    pending: VecDeque<RawDeal>,
    current_page: Option<PageInFlight>,
    page_records: u64,
    resume_exhausted: bool,
    max_pages: u64,
    checkpoint_interval: u64,
}

impl ExtractionEngine {
    /// Create an engine for a fresh run.
    ///
    /// # Errors
    /// Returns a configuration error when the job parameters are invalid;
    /// no network activity happens before validation passes.
    pub fn new(
        client: Arc<CrmHttpClient>,
        job: ExtractionJob,
        hooks: Arc<dyn ControlHooks>,
    ) -> Result<Self, ExtractError> {
        job.validate()?;
        let mapper = RecordMapper::for_job(&job);
        Ok(Self {
            client,
            job,
            hooks,
            mapper,
            state: EngineState::Fetching,
            cursor: None,
            pages_processed: 0,
            records_processed: 0,
            pending: VecDeque::new(),
            current_page: None,
            page_records: 0,
            resume_exhausted: false,
            max_pages: MAX_PAGES,
            checkpoint_interval: CHECKPOINT_INTERVAL_PAGES,
        })
    }

    /// Seed the engine from a persisted checkpoint position.
    ///
    /// A resume point without a cursor means the previous run consumed the
    /// whole collection: the engine completes immediately without emitting
    /// further records.
    pub fn with_resume(mut self, resume: Option<ResumePoint>) -> Self {
        if let Some(resume) = resume {
            info!(
                page_number = resume.page_number,
                records_processed = resume.records_processed,
                has_cursor = resume.cursor.is_some(),
                "seeding engine from resume point"
            );
            self.resume_exhausted = resume.cursor.is_none();
            self.cursor = resume.cursor;
            self.pages_processed = resume.page_number;
            self.records_processed = resume.records_processed;
        }
        self
    }

    /// Override the page safety cap.
    pub fn with_max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Override the periodic checkpoint interval (in pages).
    pub fn with_checkpoint_interval(mut self, pages: u64) -> Self {
        self.checkpoint_interval = pages.max(1);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Records emitted across completed bookkeeping (including the resume
    /// seed).
    pub fn records_processed(&self) -> u64 {
        self.records_processed + self.page_records
    }

    /// Fully consumed pages so far.
    pub fn pages_processed(&self) -> u64 {
        self.pages_processed
    }

    /// Cursor the next fetch would use.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Advance the state machine and yield the next mapped record.
    ///
    /// Returns `None` once the run has completed, paused, been cancelled,
    /// or failed; a fetch failure yields one `Err` item first.
    pub async fn next_record(&mut self) -> Option<Result<MappedRecord, ExtractError>> {
        loop {
            if self.state != EngineState::Fetching {
                return None;
            }

            // Drain the page in flight, honoring pause between records
            if let Some(raw) = self.pending.pop_front() {
                if self.hooks.should_pause(&self.job.scan_id).await {
                    info!(
                        job_id = %self.job.scan_id,
                        page_number = self.pages_processed + 1,
                        records_in_page = self.page_records,
                        total_processed = self.records_processed + self.page_records,
                        "extraction paused mid-page"
                    );
                    let checkpoint = CheckpointPayload::paused_mid_page(
                        self.records_processed + self.page_records,
                        self.cursor.clone(),
                        self.pages_processed,
                        self.job.page_size,
                        self.page_records,
                    );
                    self.save_checkpoint(checkpoint).await;
                    self.state = EngineState::PausedMidPage;
                    return None;
                }

                let mapped = self.mapper.map_record(&raw, self.pages_processed + 1);
                self.page_records += 1;
                return Some(Ok(mapped));
            }

            // Page fully drained: advance counters, checkpoint, move cursor
            if let Some(page) = self.current_page.take() {
                self.records_processed += self.page_records;
                self.pages_processed += 1;
                metrics::record_page_consumed(self.page_records);
                let last_page_records = self.page_records;
                self.page_records = 0;

                if self.pages_processed % self.checkpoint_interval == 0 {
                    let checkpoint = CheckpointPayload::progress(
                        self.records_processed,
                        page.next_cursor.clone(),
                        self.pages_processed,
                        self.job.page_size,
                        last_page_records,
                    );
                    self.save_checkpoint(checkpoint).await;
                }

                match page.next_cursor {
                    Some(cursor) => self.cursor = Some(cursor),
                    None => {
                        info!(
                            job_id = %self.job.scan_id,
                            total_records = self.records_processed,
                            total_pages = self.pages_processed,
                            "extraction completed"
                        );
                        let checkpoint = CheckpointPayload::completed(
                            self.records_processed,
                            self.pages_processed,
                            self.job.page_size,
                        );
                        self.save_checkpoint(checkpoint).await;
                        self.state = EngineState::Completed;
                        return None;
                    }
                }
            }

            // Resumed past the last page: nothing left to fetch
            if self.resume_exhausted {
                info!(
                    job_id = %self.job.scan_id,
                    total_records = self.records_processed,
                    "resume point has no cursor; nothing left to extract"
                );
                let checkpoint = CheckpointPayload::completed(
                    self.records_processed,
                    self.pages_processed,
                    self.job.page_size,
                );
                self.save_checkpoint(checkpoint).await;
                self.state = EngineState::Completed;
                return None;
            }

            // Safety cap: implicit stop, not an error
            if self.pages_processed >= self.max_pages {
                warn!(
                    job_id = %self.job.scan_id,
                    pages = self.pages_processed,
                    "page safety limit reached; stopping extraction"
                );
                self.state = EngineState::Completed;
                return None;
            }

            // Cancellation wins over pause when both are signaled
            if self.hooks.should_cancel(&self.job.scan_id).await {
                info!(
                    job_id = %self.job.scan_id,
                    page_number = self.pages_processed + 1,
                    total_processed = self.records_processed,
                    "extraction cancelled"
                );
                let checkpoint = CheckpointPayload::cancelled(
                    self.records_processed,
                    self.cursor.clone(),
                    self.pages_processed,
                    self.job.page_size,
                );
                self.save_checkpoint(checkpoint).await;
                self.state = EngineState::Cancelled;
                return None;
            }

            if self.hooks.should_pause(&self.job.scan_id).await {
                info!(
                    job_id = %self.job.scan_id,
                    page_number = self.pages_processed + 1,
                    total_processed = self.records_processed,
                    "extraction paused"
                );
                let checkpoint = CheckpointPayload::paused(
                    self.records_processed,
                    self.cursor.clone(),
                    self.pages_processed,
                    self.job.page_size,
                );
                self.save_checkpoint(checkpoint).await;
                self.state = EngineState::Paused;
                return None;
            }

            debug!(
                job_id = %self.job.scan_id,
                page_number = self.pages_processed + 1,
                has_cursor = self.cursor.is_some(),
                "fetching page"
            );
            match self
                .client
                .fetch_deals(
                    self.job.page_size,
                    self.cursor.as_deref(),
                    self.job.access_token.as_deref(),
                    self.job.endpoint.as_deref(),
                )
                .await
            {
                Ok(page) => {
                    let next_cursor = page.forward_cursor().map(str::to_string);
                    debug!(
                        records = page.results.len(),
                        has_next = next_cursor.is_some(),
                        "page fetched"
                    );
                    self.pending = page.results.into();
                    self.current_page = Some(PageInFlight { next_cursor });
                    self.page_records = 0;
                }
                Err(e) => {
                    error!(
                        job_id = %self.job.scan_id,
                        page_number = self.pages_processed + 1,
                        error = %e,
                        "page fetch failed"
                    );
                    let checkpoint = CheckpointPayload::error(
                        self.records_processed,
                        self.cursor.clone(),
                        self.pages_processed,
                        self.job.page_size,
                        e.to_string(),
                    );
                    self.save_checkpoint(checkpoint).await;
                    self.state = EngineState::Failed;
                    return Some(Err(ExtractError::Api(e)));
                }
            }
        }
    }

    /// Adapt the engine into a pull-based [`Stream`] of mapped records.
    pub fn into_stream(self) -> RecordStream {
        Box::pin(futures_util::stream::unfold(self, |mut engine| async move {
            engine.next_record().await.map(|item| (item, engine))
        }))
    }

    /// Persist a checkpoint; failures are logged and swallowed so they can
    /// never abort the run.
    async fn save_checkpoint(&self, checkpoint: CheckpointPayload) {
        let phase = checkpoint.phase;
        match self.hooks.save_checkpoint(&self.job.scan_id, &checkpoint).await {
            Ok(()) => {
                metrics::record_checkpoint_saved(phase.as_str());
                debug!(
                    job_id = %self.job.scan_id,
                    phase = %phase,
                    records_processed = checkpoint.records_processed,
                    "checkpoint saved"
                );
            }
            Err(e) => {
                metrics::record_checkpoint_failure(phase.as_str());
                warn!(
                    job_id = %self.job.scan_id,
                    phase = %phase,
                    error = %e,
                    "failed to save checkpoint"
                );
            }
        }
    }
}
