//! Mock transport for tests and hardware-free hosts
//!
//! Feeds a scripted sequence of lines to the engine and can inject a
//! transport failure at any point to exercise the error path.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{Result, ScopeError};
use crate::transport::Transport;

/// Scripted transport: yields queued lines, then optionally fails
#[derive(Debug, Default)]
pub struct MockTransport {
    lines: VecDeque<String>,
    fail_after: Option<String>,
    closed: bool,
}

impl MockTransport {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock pre-loaded with lines
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            fail_after: None,
            closed: false,
        }
    }

    /// Queue another line
    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
    }

    /// Fail with a transport error once the queue is drained
    pub fn fail_when_drained(mut self, message: impl Into<String>) -> Self {
        self.fail_after = Some(message.into());
        self
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Transport for MockTransport {
    fn bytes_available(&mut self) -> Result<usize> {
        if self.lines.is_empty() {
            if let Some(msg) = self.fail_after.take() {
                return Err(ScopeError::Transport(msg));
            }
            Ok(0)
        } else {
            // Approximate: one byte per queued character plus the newline
            Ok(self.lines.iter().map(|l| l.len() + 1).sum())
        }
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
