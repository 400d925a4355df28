//! Newline-delimited JSON record writer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::output::{OutputError, OutputResult, RecordWriter};
use crate::MappedRecord;

/// Flush buffered output every N records so progress survives a crash.
const FLUSH_INTERVAL: u64 = 1_000;

/// Buffered NDJSON writer: one flat JSON object per line.
pub struct NdjsonWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    records_written: u64,
}

impl NdjsonWriter {
    /// Create (or truncate) the output file at `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| OutputError::Io(e.to_string()))?;
            }
        }
        let file = File::create(&path).map_err(|e| OutputError::Io(e.to_string()))?;
        debug!(path = %path.display(), "NDJSON writer opened");
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            records_written: 0,
        })
    }

    /// Records written so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

impl RecordWriter for NdjsonWriter {
    fn write_record(&mut self, record: &MappedRecord) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, record)
            .map_err(|e| OutputError::Serialization(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| OutputError::Io(e.to_string()))?;
        self.records_written += 1;

        if self.records_written % FLUSH_INTERVAL == 0 {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::Flush(e.to_string()))
    }

    fn close(mut self) -> OutputResult<()> {
        self.flush()?;
        info!(
            path = %self.path.display(),
            records = self.records_written,
            "NDJSON output finalized"
        );
        Ok(())
    }
}
