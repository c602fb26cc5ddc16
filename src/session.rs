//! Session persistence: export captured windows to CSV and import them back
//!
//! The on-disk format is the same one the live [`crate::sink::CsvSink`]
//! writes: a `Timestamp,Ch1..ChN` header followed by one row per sample,
//! timestamps as time-of-day with millisecond precision. Import is
//! all-or-nothing: any malformed row rejects the whole file and leaves the
//! live buffers untouched.

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::buffer::ScopeBuffers;
use crate::error::{Result, ScopeError};
use crate::types::TIMESTAMP_FORMAT;

/// A fully parsed session file, ready to swap into the live buffers
#[derive(Debug, Clone)]
pub struct SessionData {
    pub timestamps: Vec<DateTime<Local>>,
    /// One inner vec per channel, each the same length as `timestamps`
    pub channels: Vec<Vec<f64>>,
}

impl SessionData {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Parse a session CSV file. Validates the entire file before
    /// returning: a header row, a uniform channel arity, and every field
    /// numeric. Timestamps are time-of-day; they are attached to today's
    /// date on import.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            ScopeError::Import(format!("Failed to open session {:?}: {}", path, e))
        })?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let header = match lines.next() {
            Some(line) => line.map_err(|e| {
                ScopeError::Import(format!("Failed to read session header: {}", e))
            })?,
            None => return Err(ScopeError::Import("Empty session file".to_string())),
        };
        let columns: Vec<&str> = header.split(',').collect();
        if columns.len() < 2 || !columns[0].eq_ignore_ascii_case("timestamp") {
            return Err(ScopeError::Import(format!(
                "Invalid session header: {:?}",
                header
            )));
        }
        let arity = columns.len() - 1;

        let today = Local::now().date_naive();
        let mut timestamps = Vec::new();
        let mut channels: Vec<Vec<f64>> = vec![Vec::new(); arity];

        for (row, line) in lines.enumerate() {
            let line = line.map_err(|e| {
                ScopeError::Import(format!("Failed to read row {}: {}", row + 2, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != arity + 1 {
                return Err(ScopeError::Import(format!(
                    "Row {}: expected {} fields, got {}",
                    row + 2,
                    arity + 1,
                    fields.len()
                )));
            }

            let time = NaiveTime::parse_from_str(fields[0], TIMESTAMP_FORMAT)
                .map_err(|e| {
                    ScopeError::Import(format!(
                        "Row {}: bad timestamp {:?}: {}",
                        row + 2,
                        fields[0],
                        e
                    ))
                })?;
            let timestamp = Local
                .from_local_datetime(&today.and_time(time))
                .single()
                .ok_or_else(|| {
                    ScopeError::Import(format!(
                        "Row {}: ambiguous local time {:?}",
                        row + 2,
                        fields[0]
                    ))
                })?;

            let mut values = Vec::with_capacity(arity);
            for (i, field) in fields[1..].iter().enumerate() {
                let value: f64 = field.trim().parse().map_err(|_| {
                    ScopeError::Import(format!(
                        "Row {}: bad value {:?} in column {}",
                        row + 2,
                        field,
                        i + 2
                    ))
                })?;
                values.push(value);
            }

            timestamps.push(timestamp);
            for (channel, value) in channels.iter_mut().zip(values) {
                channel.push(value);
            }
        }

        Ok(Self {
            timestamps,
            channels,
        })
    }
}

/// Write the current buffer contents to a session CSV file.
///
/// Produces the same format [`crate::sink::CsvSink`] writes live, so a
/// saved session round-trips through [`SessionData::load`].
pub fn write_session(path: impl AsRef<Path>, buffers: &ScopeBuffers) -> Result<()> {
    let path = path.as_ref();
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);

    write!(writer, "Timestamp")?;
    for i in 0..buffers.channel_count() {
        write!(writer, ",Ch{}", i + 1)?;
    }
    writeln!(writer)?;

    for (i, timestamp) in buffers.timeline().iter().enumerate() {
        write!(writer, "{}", timestamp.format(TIMESTAMP_FORMAT))?;
        for c in 0..buffers.channel_count() {
            let value = buffers
                .channel(c)
                .and_then(|ch| ch.get(i))
                .ok_or_else(|| {
                    ScopeError::Import(format!("Channel {} missing sample {}", c + 1, i))
                })?;
            write!(writer, ",{}", value)?;
        }
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}
