//! Dual-cursor measurement over the live buffers
//!
//! A [`CursorMarker`] is a user-placed sample index bound to the shared
//! buffers. It holds no copies: resolution reads through [`SharedBuffers`]
//! every time, because the underlying windows slide as samples arrive and
//! old ones are evicted. An index that falls outside the current window
//! resolves to `None` rather than erroring.
//!
//! [`MeasurementPair`] owns up to two markers and derives the elapsed time
//! between them. Placement is cyclic: the first click places T1, the second
//! T2, a third resets both and places a fresh T1. Observers are plain
//! callables invoked in registration order after every mutation.
//!
//! Cursors are index-based, not timestamp-based: after a window slide a
//! marker refers to whatever sample now occupies its index. See DESIGN.md
//! for the trade-off against timestamp pinning.

use chrono::{DateTime, Duration, Local};

use crate::buffer::SharedBuffers;

/// Resolved view of one cursor at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct CursorSnapshot {
    /// The sample index the cursor sits on
    pub index: usize,
    /// Timestamp of that sample
    pub timestamp: DateTime<Local>,
    /// Per-channel values of that sample
    pub values: Vec<f64>,
}

/// Identifies one of the two cursors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorId {
    /// T1, placed by the first click of a cycle
    First,
    /// T2, placed by the second click
    Second,
}

/// One measurement marker: a sample index bound to the shared buffers
#[derive(Debug, Clone)]
pub struct CursorMarker {
    index: usize,
    buffers: SharedBuffers,
}

impl CursorMarker {
    /// Bind a marker to the buffers at the given index
    pub fn new(buffers: SharedBuffers, index: usize) -> Self {
        Self { index, buffers }
    }

    /// Current sample index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Move the marker (user drag). The caller re-resolves and notifies.
    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Resolve to the sample currently at this index.
    ///
    /// `None` if the index is outside the window — before any data exists,
    /// or after eviction or a capacity change shrank the effective range.
    /// With unchanged buffers and an unchanged index this is idempotent.
    pub fn resolve(&self) -> Option<CursorSnapshot> {
        let buffers = self.buffers.read().ok()?;
        buffers.sample_at(self.index).map(|sample| CursorSnapshot {
            index: self.index,
            timestamp: sample.timestamp,
            values: sample.values,
        })
    }
}

/// Derived measurement state: both cursor snapshots plus Δt
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementReadout {
    /// Resolved T1, if placed and in range
    pub first: Option<CursorSnapshot>,
    /// Resolved T2, if placed and in range
    pub second: Option<CursorSnapshot>,
    /// Elapsed time between the two, when both resolve
    pub delta: Option<Duration>,
}

impl MeasurementReadout {
    /// Human-readable Δt with millisecond precision.
    ///
    /// The undefined state is a value (`"Δt = ---"`), not an error.
    pub fn delta_label(&self) -> String {
        match self.delta {
            Some(dt) => format!("Δt = {:.3} sec", dt.num_milliseconds() as f64 / 1000.0),
            None => "Δt = ---".to_string(),
        }
    }
}

/// Observer callback for measurement changes
pub type MeasurementObserver = Box<dyn FnMut(&MeasurementReadout) + Send>;

/// Owns zero, one, or two cursors and derives the time between them
pub struct MeasurementPair {
    buffers: SharedBuffers,
    first: Option<CursorMarker>,
    second: Option<CursorMarker>,
    observers: Vec<MeasurementObserver>,
}

impl std::fmt::Debug for MeasurementPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeasurementPair")
            .field("first", &self.first.as_ref().map(|c| c.index()))
            .field("second", &self.second.as_ref().map(|c| c.index()))
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl MeasurementPair {
    /// Create an empty pair bound to the shared buffers
    pub fn new(buffers: SharedBuffers) -> Self {
        Self {
            buffers,
            first: None,
            second: None,
            observers: Vec::new(),
        }
    }

    /// Register an observer. Observers run in registration order, after the
    /// mutation that triggered them has fully completed.
    pub fn subscribe(&mut self, observer: MeasurementObserver) {
        self.observers.push(observer);
    }

    /// Place a cursor at `index` following the cyclic policy:
    /// first click places T1, second places T2, third resets and places T1.
    pub fn place(&mut self, index: usize) -> CursorId {
        let placed = if self.first.is_none() {
            self.first = Some(CursorMarker::new(self.buffers.clone(), index));
            CursorId::First
        } else if self.second.is_none() {
            self.second = Some(CursorMarker::new(self.buffers.clone(), index));
            CursorId::Second
        } else {
            self.first = Some(CursorMarker::new(self.buffers.clone(), index));
            self.second = None;
            CursorId::First
        };
        self.notify();
        placed
    }

    /// Move a live cursor to a new index (user drag).
    ///
    /// Returns `false` when that cursor is not currently placed.
    pub fn move_cursor(&mut self, id: CursorId, index: usize) -> bool {
        let cursor = match id {
            CursorId::First => self.first.as_mut(),
            CursorId::Second => self.second.as_mut(),
        };
        match cursor {
            Some(marker) => {
                marker.set_index(index);
                self.notify();
                true
            }
            None => false,
        }
    }

    /// Remove both cursors
    pub fn reset(&mut self) {
        self.first = None;
        self.second = None;
        self.notify();
    }

    /// Number of live cursors (0, 1, or 2)
    pub fn live_count(&self) -> usize {
        self.first.is_some() as usize + self.second.is_some() as usize
    }

    /// Cursor index, if that cursor is placed
    pub fn index_of(&self, id: CursorId) -> Option<usize> {
        match id {
            CursorId::First => self.first.as_ref().map(|c| c.index()),
            CursorId::Second => self.second.as_ref().map(|c| c.index()),
        }
    }

    /// Recompute the derived state from the current buffers
    pub fn readout(&self) -> MeasurementReadout {
        let first = self.first.as_ref().and_then(|c| c.resolve());
        let second = self.second.as_ref().and_then(|c| c.resolve());
        let delta = match (&first, &second) {
            (Some(a), Some(b)) => {
                let dt = b.timestamp.signed_duration_since(a.timestamp);
                Some(if dt < Duration::zero() { -dt } else { dt })
            }
            _ => None,
        };
        MeasurementReadout {
            first,
            second,
            delta,
        }
    }

    /// Elapsed time between the cursors, when both resolve
    pub fn delta(&self) -> Option<Duration> {
        self.readout().delta
    }

    /// Re-resolve both cursors against the (possibly shifted) buffers and
    /// notify observers. The engine calls this on every redraw signal.
    pub fn refresh(&mut self) {
        self.notify();
    }

    fn notify(&mut self) {
        let readout = self.readout();
        for observer in &mut self.observers {
            observer(&readout);
        }
    }
}
