//! On-disk recording file layout: a fixed 32-byte header followed by packed
//! 10-byte sample records. All multi-byte fields are little-endian.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Magic bytes as they appear on disk (reads as `0x41574152` little-endian).
pub const MAGIC: [u8; 4] = *b"RAWA";

/// Nominal sample rate written to every header.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Size in bytes of [`RecordingHeader`] on disk.
pub const HEADER_LEN: usize = 32;

/// Size in bytes of [`SampleRecord`] on disk.
pub const RECORD_LEN: usize = 10;

/// The fixed 32-byte recording file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub sample_rate: u32,
    pub total_samples: u32,
    pub start_timestamp_ms: u32,
    pub end_timestamp_ms: u32,
}

impl RecordingHeader {
    /// A fresh header for a recording that is about to start: zero samples,
    /// zero end timestamp.
    pub fn new_open(start_timestamp_ms: u32) -> Self {
        Self {
            magic: MAGIC,
            version: crate::FORMAT_VERSION,
            sample_rate: SAMPLE_RATE_HZ,
            total_samples: 0,
            start_timestamp_ms,
            end_timestamp_ms: 0,
        }
    }

    /// True if the header claims the recording was never finalized.
    pub fn is_open(&self) -> bool {
        self.total_samples == 0 && self.end_timestamp_ms == 0
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_all(&self.magic)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u32::<LittleEndian>(self.sample_rate)?;
        w.write_u32::<LittleEndian>(self.total_samples)?;
        w.write_u32::<LittleEndian>(self.start_timestamp_ms)?;
        w.write_u32::<LittleEndian>(self.end_timestamp_ms)?;
        w.write_all(&[0u8; 16])?; // reserved: four zero words
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        let version = r.read_u32::<LittleEndian>()?;
        let sample_rate = r.read_u32::<LittleEndian>()?;
        let total_samples = r.read_u32::<LittleEndian>()?;
        let start_timestamp_ms = r.read_u32::<LittleEndian>()?;
        let end_timestamp_ms = r.read_u32::<LittleEndian>()?;
        let mut reserved = [0u8; 16];
        r.read_exact(&mut reserved)?;
        Ok(Self {
            magic,
            version,
            sample_rate,
            total_samples,
            start_timestamp_ms,
            end_timestamp_ms,
        })
    }
}

/// A single 10-byte sample record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRecord {
    /// Sanitized analog reading, always in `[0, 4095]`.
    pub value: u16,
    pub timestamp_ms: u32,
    pub sequence_no: u32,
}

impl SampleRecord {
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        w.write_u16::<LittleEndian>(self.value)?;
        w.write_u32::<LittleEndian>(self.timestamp_ms)?;
        w.write_u32::<LittleEndian>(self.sequence_no)?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut r: R) -> io::Result<Self> {
        let value = r.read_u16::<LittleEndian>()?;
        let timestamp_ms = r.read_u32::<LittleEndian>()?;
        let sequence_no = r.read_u32::<LittleEndian>()?;
        Ok(Self {
            value,
            timestamp_ms,
            sequence_no,
        })
    }
}

/// Recovers the true sample count of a file from its byte size alone, using
/// the crash-recovery contract: `(filesize - 32) / 10`.
pub fn recover_sample_count(file_len: u64) -> Option<u64> {
    let body = file_len.checked_sub(HEADER_LEN as u64)?;
    if body % RECORD_LEN as u64 != 0 {
        return None;
    }
    Some(body / RECORD_LEN as u64)
}
