//! Core data types for the serialscope engine
//!
//! This module contains the fundamental data structures used throughout
//! the crate for representing samples, channel-count discovery, engine
//! lifecycle state, and acquisition statistics.
//!
//! # Main Types
//!
//! - [`Sample`] - One timestamped tuple of per-channel readings
//! - [`ChannelCount`] - Pending vs. established channel arity for a session
//! - [`EngineState`] - Acquisition lifecycle (Idle / Reading)
//! - [`AcquisitionStats`] - Counters for accepted samples, skipped lines, etc.
//!
//! # Timestamps
//!
//! Samples carry wall-clock timestamps (`chrono::DateTime<Local>`) with
//! sub-millisecond resolution in memory. The persistence layer truncates to
//! milliseconds (`%H:%M:%S%.3f`), which is the documented precision floor
//! for session round-trips.

use chrono::{DateTime, Local};

/// Timestamp format used by the persistence sink and session files.
///
/// Time-of-day only, millisecond precision. Dates are not persisted, so
/// measurements across a session reimport remain valid except when the
/// recording spans local midnight.
pub const TIMESTAMP_FORMAT: &str = "%H:%M:%S%.3f";

/// One timestamped tuple of per-channel scalar readings
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Wall-clock capture time
    pub timestamp: DateTime<Local>,
    /// One value per channel, in channel order
    pub values: Vec<f64>,
}

impl Sample {
    /// Create a sample captured now
    pub fn now(values: Vec<f64>) -> Self {
        Self {
            timestamp: Local::now(),
            values,
        }
    }

    /// Create a sample with an explicit timestamp
    pub fn at(timestamp: DateTime<Local>, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }

    /// Number of channels in this sample
    pub fn channel_count(&self) -> usize {
        self.values.len()
    }
}

/// Channel arity for the current session
///
/// The arity is unknown until the first line parses successfully; from then
/// on every line must carry the same number of fields. Represented as a
/// tagged state rather than an `Option` so the establishment transition is
/// explicit at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelCount {
    /// No line has been accepted yet
    #[default]
    Pending,
    /// Fixed for the remainder of the session
    Established(usize),
}

impl ChannelCount {
    /// Get the established count, if any
    pub fn get(&self) -> Option<usize> {
        match self {
            ChannelCount::Pending => None,
            ChannelCount::Established(n) => Some(*n),
        }
    }

    /// Check whether the count has been established
    pub fn is_established(&self) -> bool {
        matches!(self, ChannelCount::Established(_))
    }

    /// Check a candidate arity against this state.
    ///
    /// Returns `true` when the candidate is acceptable: either the count is
    /// still pending (any non-zero arity establishes it) or it matches the
    /// established value.
    pub fn accepts(&self, arity: usize) -> bool {
        match self {
            ChannelCount::Pending => arity > 0,
            ChannelCount::Established(n) => *n == arity,
        }
    }
}

impl std::fmt::Display for ChannelCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelCount::Pending => write!(f, "pending"),
            ChannelCount::Established(n) => write!(f, "{} channels", n),
        }
    }
}

/// Acquisition lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No transport attached; buffered data (if any) remains measurable
    #[default]
    Idle,
    /// Draining lines from an open transport
    Reading,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "Idle"),
            EngineState::Reading => write!(f, "Reading"),
        }
    }
}

/// Statistics about the current acquisition session
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AcquisitionStats {
    /// Lines that parsed and were appended to the buffers and sink
    pub accepted_samples: u64,
    /// Lines skipped due to parse failure or arity mismatch
    pub skipped_lines: u64,
    /// Redraw signals emitted by the throttle
    pub redraws_signalled: u64,
    /// Transport errors observed (each one stops acquisition)
    pub transport_errors: u64,
    /// Sink write failures observed (each one stops acquisition)
    pub sink_errors: u64,
    /// Notifications dropped due to a full event channel
    pub dropped_events: u64,
}

impl AcquisitionStats {
    /// Fraction of processed lines that were accepted, as a percentage
    pub fn accept_rate(&self) -> f64 {
        let total = self.accepted_samples + self.skipped_lines;
        if total == 0 {
            100.0
        } else {
            (self.accepted_samples as f64 / total as f64) * 100.0
        }
    }
}
