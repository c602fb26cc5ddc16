//! Bounded sample storage: per-channel windows plus a lockstep timeline
//!
//! Each channel keeps the most recent `capacity` values in a `VecDeque`
//! ring; the [`Timeline`] keeps the matching timestamps. [`ScopeBuffers`]
//! owns the whole triple and is the only place the lockstep invariant
//! (`timeline.len() == window.len()` for every channel, at all observable
//! times) is maintained.
//!
//! # Eviction
//!
//! Appending at capacity drops the oldest element first (FIFO), so the
//! retained values are always the most recent in arrival order. Capacity is
//! runtime-mutable and applies prospectively: shrinking does not reshape
//! existing buffers, the next push evicts down to the new bound.
//!
//! # Sharing
//!
//! [`SharedBuffers`] (`Arc<RwLock<ScopeBuffers>>`) is the accessor cursors
//! read through. The acquisition engine is the single writer; cursor
//! resolution and rendering take read locks, which is required because
//! append+evict is not atomic with respect to index-based reads.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use crate::types::Sample;

/// Default window capacity per channel
pub const DEFAULT_MAX_SAMPLES: usize = 1000;

/// Shared, read-mostly handle to the buffer triple
pub type SharedBuffers = Arc<RwLock<ScopeBuffers>>;

/// Fixed-capacity FIFO window of scalar values for one channel
#[derive(Debug, Clone)]
pub struct ChannelWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl ChannelWindow {
    /// Create an empty window with the given capacity (clamped to >= 1,
    /// since a zero bound would make push unable to retain anything)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, evicting oldest entries while at or over capacity
    pub fn push(&mut self, value: f64) {
        while self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Current number of retained values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the window holds no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Current capacity bound
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity bound (clamped to >= 1). Applies prospectively —
    /// existing contents are kept until the next push evicts down to the
    /// new bound.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
    }

    /// Value at a chronological index (0 = oldest retained)
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Iterate contents in chronological order. Valid until the next mutation.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }
}

/// Fixed-capacity FIFO window of sample timestamps
#[derive(Debug, Clone)]
pub struct Timeline {
    stamps: VecDeque<DateTime<Local>>,
    capacity: usize,
}

impl Timeline {
    /// Create an empty timeline with the given capacity (clamped to >= 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            stamps: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a timestamp with the same eviction policy as [`ChannelWindow`]
    pub fn push(&mut self, stamp: DateTime<Local>) {
        while self.stamps.len() >= self.capacity {
            self.stamps.pop_front();
        }
        self.stamps.push_back(stamp);
    }

    /// Current number of retained timestamps
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    /// Whether the timeline holds no timestamps
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    /// Change the capacity bound (clamped to >= 1; prospective, like the
    /// channel windows)
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
    }

    /// Timestamp at a chronological index (0 = oldest retained)
    pub fn get(&self, index: usize) -> Option<DateTime<Local>> {
        self.stamps.get(index).copied()
    }

    /// Iterate timestamps in chronological order
    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Local>> {
        self.stamps.iter()
    }
}

/// The buffer triple: one timeline plus one window per channel
///
/// The acquisition engine owns the only mutable handle; everything else
/// reads through [`SharedBuffers`].
#[derive(Debug)]
pub struct ScopeBuffers {
    timeline: Timeline,
    channels: Vec<ChannelWindow>,
    capacity: usize,
}

impl ScopeBuffers {
    /// Create empty buffers with no channels allocated yet. Capacity is
    /// clamped to >= 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            timeline: Timeline::new(capacity),
            channels: Vec::new(),
            capacity,
        }
    }

    /// Wrap fresh buffers in a shared handle
    pub fn shared(capacity: usize) -> SharedBuffers {
        Arc::new(RwLock::new(Self::new(capacity)))
    }

    /// Number of allocated channels (0 until the first sample establishes it)
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of retained samples
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    /// Whether no samples are retained
    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    /// Current capacity bound
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lazily allocate per-channel windows. Called once, on establishment.
    pub fn allocate_channels(&mut self, count: usize) {
        debug_assert!(self.channels.is_empty());
        self.channels = (0..count).map(|_| ChannelWindow::new(self.capacity)).collect();
    }

    /// Append one sample across the timeline and every channel window.
    ///
    /// The caller guarantees `values.len() == channel_count()`; arity is
    /// enforced upstream so a mismatch here is a logic error.
    pub fn push_sample(&mut self, timestamp: DateTime<Local>, values: &[f64]) {
        debug_assert_eq!(values.len(), self.channels.len());
        self.timeline.push(timestamp);
        for (window, value) in self.channels.iter_mut().zip(values) {
            window.push(*value);
        }
    }

    /// Resolve a sample index to its timestamp and per-channel values.
    ///
    /// Returns `None` when the index is outside `[0, len)`.
    pub fn sample_at(&self, index: usize) -> Option<Sample> {
        let timestamp = self.timeline.get(index)?;
        let values = self.channels.iter().filter_map(|w| w.get(index)).collect::<Vec<_>>();
        if values.len() != self.channels.len() {
            return None;
        }
        Some(Sample::at(timestamp, values))
    }

    /// Timestamp at an index
    pub fn timestamp_at(&self, index: usize) -> Option<DateTime<Local>> {
        self.timeline.get(index)
    }

    /// Read access to one channel window
    pub fn channel(&self, index: usize) -> Option<&ChannelWindow> {
        self.channels.get(index)
    }

    /// Read access to the timeline
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Change the capacity bound on the timeline and every channel.
    /// Clamped to >= 1; prospective: nothing is truncated until the next
    /// push.
    pub fn set_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        self.capacity = capacity;
        self.timeline.set_capacity(capacity);
        for window in &mut self.channels {
            window.set_capacity(capacity);
        }
    }

    /// Drop all samples and channel allocations
    pub fn clear(&mut self) {
        self.timeline = Timeline::new(self.capacity);
        self.channels.clear();
    }

    /// Atomically replace the entire contents (session import).
    ///
    /// The staging data must already be validated: all channel vectors the
    /// same length as the timestamp vector.
    pub fn replace(&mut self, timestamps: Vec<DateTime<Local>>, channels: Vec<Vec<f64>>) {
        debug_assert!(channels.iter().all(|c| c.len() == timestamps.len()));
        self.clear();
        self.allocate_channels(channels.len());
        for (i, ts) in timestamps.into_iter().enumerate() {
            self.timeline.push(ts);
            for (window, column) in self.channels.iter_mut().zip(&channels) {
                window.push(column[i]);
            }
        }
    }
}
