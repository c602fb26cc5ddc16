//! Redraw throttling
//!
//! A full re-plot is expensive; sample arrival can exceed thousands of lines
//! per second. [`RenderThrottle`] decouples the two: every accepted sample
//! ticks the throttle, and only every Nth tick fires a redraw signal. Data
//! storage and persistence are never throttled — only the redraw cadence.

use crate::error::{Result, ScopeError};

/// Default redraw interval: signal a redraw every 10th accepted sample
pub const DEFAULT_REDRAW_EVERY: u32 = 10;

/// Outcome of a throttle tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleSignal {
    /// Emit a redraw now
    Fire,
    /// Not yet
    Hold,
}

impl ThrottleSignal {
    /// Check whether this tick fired
    pub fn fired(&self) -> bool {
        matches!(self, ThrottleSignal::Fire)
    }
}

/// Counts accepted samples and fires every Nth one
#[derive(Debug, Clone)]
pub struct RenderThrottle {
    every: u32,
    counter: u32,
}

impl Default for RenderThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_REDRAW_EVERY)
    }
}

impl RenderThrottle {
    /// Create a throttle that fires every `every` ticks.
    ///
    /// `every == 1` fires on every sample.
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            counter: 0,
        }
    }

    /// Current interval
    pub fn every(&self) -> u32 {
        self.every
    }

    /// Change the interval.
    ///
    /// Takes effect on the next tick; the running counter is kept so the
    /// change is never retroactive. Zero is rejected and the prior value
    /// retained.
    pub fn set_every(&mut self, every: u32) -> Result<()> {
        if every == 0 {
            return Err(ScopeError::Config(
                "redraw interval must be at least 1".to_string(),
            ));
        }
        self.every = every;
        Ok(())
    }

    /// Register one accepted sample.
    pub fn tick(&mut self) -> ThrottleSignal {
        self.counter += 1;
        if self.counter >= self.every {
            self.counter = 0;
            ThrottleSignal::Fire
        } else {
            ThrottleSignal::Hold
        }
    }

    /// Reset the running counter (e.g. on session start)
    pub fn reset(&mut self) {
        self.counter = 0;
    }
}
