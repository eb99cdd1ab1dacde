//! Storage writer: opens the recording file, batches sample records,
//! flushes on stop, and rewrites the header with final counts.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use capsule_core::header::{RecordingHeader, SampleRecord};
use capsule_core::sanitize::{sanitize, SanitizerCounters};
use thiserror::Error;
use tracing::{error, info, warn};

/// Records buffered before a batched write (512 records, 5,120 bytes).
pub const BUFFER_CAPACITY: usize = 512;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("failed to open recording file {path:?}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write recording file: {0}")]
    WriteFailed(#[source] io::Error),
    #[error("writer is not started")]
    InvalidState,
}

pub type Result<T> = std::result::Result<T, WriterError>;

/// Exclusive owner of a recording file while the audio pipeline is active.
pub struct StorageWriter {
    file: Option<File>,
    buffer: Vec<SampleRecord>,
    samples_written: u32,
    start_timestamp_ms: u32,
}

impl Default for StorageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageWriter {
    pub fn new() -> Self {
        Self {
            file: None,
            buffer: Vec::with_capacity(BUFFER_CAPACITY),
            samples_written: 0,
            start_timestamp_ms: 0,
        }
    }

    pub fn is_started(&self) -> bool {
        self.file.is_some()
    }

    /// Opens `path` write-create-truncate and writes a fresh open header.
    pub fn start(&mut self, path: &Path, now_ms: u32) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| WriterError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;

        let header = RecordingHeader::new_open(now_ms);
        header
            .write_to(&mut file)
            .map_err(WriterError::WriteFailed)?;

        self.file = Some(file);
        self.buffer.clear();
        self.samples_written = 0;
        self.start_timestamp_ms = now_ms;
        info!(?path, "recording file opened");
        Ok(())
    }

    /// Sanitizes `raw` (defense-in-depth; the queue already carries
    /// sanitized samples, and sanitizing twice is idempotent) and appends
    /// one sample record, batching the write every
    /// [`BUFFER_CAPACITY`] records.
    pub fn append(
        &mut self,
        raw: u16,
        timestamp_ms: u32,
        sequence_no: u32,
        counters: &SanitizerCounters,
    ) -> Result<()> {
        if self.file.is_none() {
            return Err(WriterError::InvalidState);
        }

        let value = sanitize(raw, counters);
        self.buffer.push(SampleRecord {
            value,
            timestamp_ms,
            sequence_no,
        });

        if self.buffer.len() == BUFFER_CAPACITY {
            self.flush_buffer()?;
        }

        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let file = self.file.as_mut().ok_or(WriterError::InvalidState)?;
        let mut bytes = Vec::with_capacity(self.buffer.len() * capsule_core::header::RECORD_LEN);
        for record in &self.buffer {
            record
                .write_to(&mut bytes)
                .map_err(WriterError::WriteFailed)?;
        }
        file.write_all(&bytes).map_err(WriterError::WriteFailed)?;
        self.samples_written += self.buffer.len() as u32;
        self.buffer.clear();
        Ok(())
    }

    /// Flushes the partial buffer, rewrites the header with final counts,
    /// and closes the file. A no-op (returns `Ok`) if already stopped.
    pub fn stop(&mut self, now_ms: u32) -> Result<()> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };

        if let Err(e) = self.flush_partial(&mut file) {
            error!(error = ?e, "failed to flush partial buffer during stop");
        }

        let header = RecordingHeader {
            magic: capsule_core::header::MAGIC,
            version: capsule_core::FORMAT_VERSION,
            sample_rate: capsule_core::header::SAMPLE_RATE_HZ,
            total_samples: self.samples_written,
            start_timestamp_ms: self.start_timestamp_ms,
            end_timestamp_ms: now_ms,
        };

        let result = (|| -> Result<()> {
            file.seek(SeekFrom::Start(0))
                .map_err(WriterError::WriteFailed)?;
            header.write_to(&mut file).map_err(WriterError::WriteFailed)
        })();

        if let Err(ref e) = result {
            warn!(error = ?e, "failed to finalize header; file may under-report total_samples");
        }

        // Close regardless of finalization outcome (file drops here).
        result
    }

    fn flush_partial(&mut self, file: &mut File) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let mut bytes = Vec::with_capacity(self.buffer.len() * capsule_core::header::RECORD_LEN);
        for record in &self.buffer {
            record
                .write_to(&mut bytes)
                .map_err(WriterError::WriteFailed)?;
        }
        file.write_all(&bytes).map_err(WriterError::WriteFailed)?;
        self.samples_written += self.buffer.len() as u32;
        self.buffer.clear();
        Ok(())
    }

    pub fn samples_written(&self) -> u32 {
        self.samples_written
    }
}

impl Drop for StorageWriter {
    fn drop(&mut self) {
        if self.file.is_some() {
            warn!("storage writer dropped without an explicit stop()");
        }
    }
}
