//! Serial port transport backed by the `serialport` crate

use std::io::Read;
use std::time::{Duration, Instant};

use crate::error::{Result, ScopeError};
use crate::transport::Transport;

/// Real serial device transport.
///
/// Bytes are accumulated internally until a newline completes a line, so a
/// line split across reads (common at high baud rates) is reassembled
/// transparently.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    pending: Vec<u8>,
}

impl SerialTransport {
    /// Open `port_name` at `baud_rate` with 8N1 framing.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(10))
            .open()
            .map_err(|e| {
                ScopeError::Transport(format!("failed to open {}: {}", port_name, e))
            })?;

        tracing::info!("Opened serial port {} at {} baud", port_name, baud_rate);

        Ok(Self {
            port,
            pending: Vec::with_capacity(256),
        })
    }

    /// Take one complete line off the front of the pending buffer, if any.
    fn take_line(&mut self) -> Option<String> {
        let newline = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=newline).collect();
        // Invalid UTF-8 bytes are replaced, then rejected downstream by the
        // numeric parser rather than killing the stream.
        Some(String::from_utf8_lossy(&line).trim_end().to_string())
    }
}

impl Transport for SerialTransport {
    fn bytes_available(&mut self) -> Result<usize> {
        // A buffered partial or complete line also counts as available work.
        let device = self.port.bytes_to_read().map_err(|e| {
            ScopeError::Transport(format!("bytes_to_read failed: {}", e))
        })?;
        Ok(device as usize + self.pending.len())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }

        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 256];
        loop {
            match self.port.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    if let Some(line) = self.take_line() {
                        return Ok(Some(line));
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    return Err(ScopeError::Transport(format!("read failed: {}", e)));
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    fn close(&mut self) {
        tracing::info!("Closing serial port");
        // Dropping the port handle releases the device; nothing else to do.
    }
}
