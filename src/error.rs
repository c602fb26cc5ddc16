//! Error handling for the serialscope acquisition engine
//!
//! This module defines the crate-wide error type and a Result alias used
//! throughout the library. Note that line-level parse failures are *not*
//! errors at this boundary — they are skipped locally by the engine and
//! only show up in [`crate::types::AcquisitionStats`].

use thiserror::Error;

/// Main error type for serialscope operations
#[derive(Error, Debug)]
pub enum ScopeError {
    /// Errors from the serial transport (open failure, device disconnect)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid runtime parameter value (prior value is retained by the caller)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed session file; buffers are left unchanged
    #[error("Import error: {0}")]
    Import(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors (sink writes, session files, config persistence)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ScopeError>,
    },
}

impl ScopeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ScopeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<serialport::Error> for ScopeError {
    fn from(err: serialport::Error) -> Self {
        ScopeError::Transport(err.to_string())
    }
}

/// Result type alias for serialscope operations
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
