//! Transport abstraction over the serial device
//!
//! The engine never talks to hardware directly; it consumes a [`Transport`]
//! that can report pending bytes and yield complete lines. This keeps the
//! acquisition core testable without a device ([`MockTransport`]) while
//! [`SerialTransport`] provides the real serialport-backed implementation.
//!
//! The intended usage pattern is a drain loop per host tick:
//!
//! ```ignore
//! while transport.bytes_available()? > 0 {
//!     if let Some(line) = transport.read_line(timeout)? {
//!         // parse + append
//!     }
//! }
//! ```
//!
//! `read_line` takes a short timeout so a stalled device can never hang a
//! tick indefinitely; a timeout yields `Ok(None)`, not an error.

pub mod mock;
pub mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

use std::time::Duration;

use crate::error::Result;

/// Byte-stream source yielding newline-terminated lines
pub trait Transport: Send {
    /// Number of bytes ready to read without blocking
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read one complete line, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when no full line arrived within the timeout.
    /// The returned line excludes the terminating newline.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>>;

    /// Release the underlying device
    fn close(&mut self);
}

/// List the names of serial ports currently present on the system
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

/// Signature for injectable transport construction (used by the backend
/// worker so tests can substitute a [`MockTransport`])
pub type TransportFactory =
    Box<dyn Fn(&str, u32) -> Result<Box<dyn Transport>> + Send>;

/// Default factory: open a real serial port
pub fn serial_factory() -> TransportFactory {
    Box::new(|port, baud| {
        SerialTransport::open(port, baud).map(|t| Box::new(t) as Box<dyn Transport>)
    })
}
