//! Persistence sinks: the durable, append-only sample log
//!
//! Every accepted sample is forwarded to a [`RecordSink`] synchronously
//! with acceptance — a slow sink backpressures the read loop instead of
//! silently dropping log records. Parse failures never reach the sink.
//!
//! [`CsvSink`] writes a `Timestamp,Ch1..ChN` header once the channel count
//! is established, then one `HH:MM:SS.mmm,v1,..,vN` row per sample.
//! [`MemorySink`] captures records in memory for tests.

use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::types::TIMESTAMP_FORMAT;

/// Append-only record writer for accepted samples
pub trait RecordSink: Send {
    /// Write the header row. Called exactly once, when the channel count is
    /// established (which may be on the first accepted sample).
    fn write_header(&mut self, channels: usize) -> Result<()>;

    /// Append one record: timestamp plus one value per channel
    fn append(&mut self, timestamp: &DateTime<Local>, values: &[f64]) -> Result<()>;

    /// Flush buffered records to durable storage
    fn flush(&mut self) -> Result<()>;
}

/// CSV-style sink backed by a buffered file writer
pub struct CsvSink {
    writer: BufWriter<File>,
    header_written: bool,
}

impl CsvSink {
    /// Create (truncate) the log file at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self {
            writer: BufWriter::new(file),
            header_written: false,
        })
    }
}

impl RecordSink for CsvSink {
    fn write_header(&mut self, channels: usize) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        write!(self.writer, "Timestamp")?;
        for i in 1..=channels {
            write!(self.writer, ",Ch{}", i)?;
        }
        writeln!(self.writer)?;
        self.header_written = true;
        Ok(())
    }

    fn append(&mut self, timestamp: &DateTime<Local>, values: &[f64]) -> Result<()> {
        write!(self.writer, "{}", timestamp.format(TIMESTAMP_FORMAT))?;
        for value in values {
            write!(self.writer, ",{}", value)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// In-memory sink for tests: records what the engine would persist
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Header channel count, once written
    pub header_channels: Option<usize>,
    /// Appended records as (formatted timestamp, values)
    pub records: Vec<(String, Vec<f64>)>,
    /// Number of flush calls observed
    pub flushes: usize,
}

impl MemorySink {
    /// Create an empty memory sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordSink for MemorySink {
    fn write_header(&mut self, channels: usize) -> Result<()> {
        self.header_channels.get_or_insert(channels);
        Ok(())
    }

    fn append(&mut self, timestamp: &DateTime<Local>, values: &[f64]) -> Result<()> {
        self.records.push((
            timestamp.format(TIMESTAMP_FORMAT).to_string(),
            values.to_vec(),
        ));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
