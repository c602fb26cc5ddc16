//! Threaded backend that owns the acquisition engine
//!
//! All serial IO runs in a dedicated worker thread so a host UI stays
//! responsive. Communication with the host goes over crossbeam channels:
//!
//! - [`BackendCommand`] - requests sent from the host to the worker
//!   (start, stop, cursor placement, session import, etc.)
//! - [`BackendMessage`] - notifications sent from the worker to the host
//!   (redraw signals, state changes, measurement updates, errors)
//! - [`FrontendHandle`] - host-side handle for sending commands and
//!   draining messages
//! - [`ScopeBackend`] - entry point that builds the channel pair and
//!   spawns the worker loop
//!
//! # Example
//!
//! ```ignore
//! use serialscope_rs::backend::{BackendMessage, ScopeBackend};
//! use serialscope_rs::config::ScopeConfig;
//!
//! let config = ScopeConfig::load_or_default();
//! let (backend, frontend) = ScopeBackend::new(config);
//! let buffers = backend.buffers();
//!
//! std::thread::spawn(move || backend.run());
//!
//! frontend.start("/dev/ttyUSB0".to_string(), 115_200, None);
//! for msg in frontend.drain() {
//!     if let BackendMessage::Redraw = msg {
//!         // repaint from `buffers`
//!     }
//! }
//! ```

pub mod worker;

pub use worker::BackendWorker;

use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::buffer::SharedBuffers;
use crate::config::ScopeConfig;
use crate::cursor::{CursorId, MeasurementReadout};
use crate::transport::{serial_factory, TransportFactory};
use crate::types::{AcquisitionStats, EngineState};

/// Request sent from the host to the backend worker
#[derive(Debug, Clone)]
pub enum BackendCommand {
    /// Open the named port and begin acquiring. `log_path` enables live
    /// CSV logging when set.
    Start {
        port: String,
        baud_rate: u32,
        log_path: Option<PathBuf>,
    },
    /// Stop acquiring; captured data stays available
    Stop,
    /// Change the redraw threshold
    SetRedrawEvery(u32),
    /// Change the per-channel window capacity
    SetMaxSamples(usize),
    /// Place the next cursor in the T1/T2 cycle at a sample index
    PlaceCursor(usize),
    /// Move an already-placed cursor to a new sample index
    MoveCursor { id: CursorId, index: usize },
    /// Clear both cursors
    ResetCursors,
    /// Replace the buffers with a saved session file
    LoadSession(PathBuf),
    /// Export the current buffers to a session file
    SaveSession(PathBuf),
    /// Re-enumerate serial ports
    RefreshPorts,
    /// Request a stats snapshot
    RequestStats,
    /// Shut the worker down
    Shutdown,
}

/// Notification sent from the backend worker to the host
#[derive(Debug, Clone)]
pub enum BackendMessage {
    /// Engine state changed
    State(EngineState),
    /// First valid line of a run fixed the channel count
    ChannelsEstablished(usize),
    /// The redraw threshold was crossed; repaint from the shared buffers
    Redraw,
    /// Cursor measurement changed
    Measurement(MeasurementReadout),
    /// Result of port enumeration
    PortList(Vec<String>),
    /// Stats snapshot
    Stats(AcquisitionStats),
    /// The transport failed and the run was aborted
    TransportError(String),
    /// A persistence operation failed (live log sink, session import or
    /// export)
    SessionError(String),
    /// Worker is shutting down
    Shutdown,
}

/// Host-side handle for the backend worker
pub struct FrontendHandle {
    /// Receiver for worker notifications
    pub receiver: Receiver<BackendMessage>,
    /// Sender for commands to the worker
    pub command_sender: Sender<BackendCommand>,
}

impl FrontendHandle {
    /// Try to receive one message without blocking
    pub fn try_recv(&self) -> Option<BackendMessage> {
        self.receiver.try_recv().ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<BackendMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Send a command to the worker
    pub fn send_command(&self, cmd: BackendCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    /// Begin acquiring from a port
    pub fn start(&self, port: String, baud_rate: u32, log_path: Option<PathBuf>) {
        let _ = self.command_sender.send(BackendCommand::Start {
            port,
            baud_rate,
            log_path,
        });
    }

    /// Stop acquiring
    pub fn stop(&self) {
        let _ = self.command_sender.send(BackendCommand::Stop);
    }

    /// Change the redraw threshold
    pub fn set_redraw_every(&self, every: u32) {
        let _ = self.command_sender.send(BackendCommand::SetRedrawEvery(every));
    }

    /// Change the window capacity
    pub fn set_max_samples(&self, max_samples: usize) {
        let _ = self
            .command_sender
            .send(BackendCommand::SetMaxSamples(max_samples));
    }

    /// Place the next cursor at a sample index
    pub fn place_cursor(&self, index: usize) {
        let _ = self.command_sender.send(BackendCommand::PlaceCursor(index));
    }

    /// Move an existing cursor
    pub fn move_cursor(&self, id: CursorId, index: usize) {
        let _ = self
            .command_sender
            .send(BackendCommand::MoveCursor { id, index });
    }

    /// Clear both cursors
    pub fn reset_cursors(&self) {
        let _ = self.command_sender.send(BackendCommand::ResetCursors);
    }

    /// Import a saved session file
    pub fn load_session(&self, path: PathBuf) {
        let _ = self.command_sender.send(BackendCommand::LoadSession(path));
    }

    /// Export the current buffers to a session file
    pub fn save_session(&self, path: PathBuf) {
        let _ = self.command_sender.send(BackendCommand::SaveSession(path));
    }

    /// Re-enumerate serial ports
    pub fn refresh_ports(&self) {
        let _ = self.command_sender.send(BackendCommand::RefreshPorts);
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_sender.send(BackendCommand::Shutdown);
    }
}

/// The acquisition backend that runs in a separate thread
pub struct ScopeBackend {
    config: ScopeConfig,
    command_receiver: Receiver<BackendCommand>,
    message_sender: Sender<BackendMessage>,
    transport_factory: TransportFactory,
    buffers: SharedBuffers,
    running: Arc<AtomicBool>,
}

impl ScopeBackend {
    /// Create a backend with its host-side handle, using real serial
    /// ports for transport
    pub fn new(config: ScopeConfig) -> (Self, FrontendHandle) {
        Self::with_transport_factory(config, serial_factory())
    }

    /// Create a backend with an injected transport factory (tests swap in
    /// a [`crate::transport::MockTransport`] here)
    pub fn with_transport_factory(
        config: ScopeConfig,
        transport_factory: TransportFactory,
    ) -> (Self, FrontendHandle) {
        let (cmd_tx, cmd_rx) = bounded(256);
        // Bounded for backpressure; redraw signals are coalesced by the
        // worker so a slow host cannot pile up messages
        let (msg_tx, msg_rx) = bounded(10_000);

        let buffers = crate::buffer::ScopeBuffers::shared(config.max_samples);

        let backend = Self {
            config,
            command_receiver: cmd_rx,
            message_sender: msg_tx,
            transport_factory,
            buffers,
            running: Arc::new(AtomicBool::new(true)),
        };

        let frontend = FrontendHandle {
            receiver: msg_rx,
            command_sender: cmd_tx,
        };

        (backend, frontend)
    }

    /// Shared read access to the sample windows. Hosts render directly
    /// from this under a read lock; the worker is the only writer.
    pub fn buffers(&self) -> SharedBuffers {
        self.buffers.clone()
    }

    /// Get a handle to stop the backend from outside
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run the worker loop until shutdown. Call from a dedicated thread.
    pub fn run(self) {
        let mut worker = BackendWorker::new(
            self.config,
            self.command_receiver,
            self.message_sender,
            self.transport_factory,
            self.buffers,
            self.running,
        );
        worker.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_backend_creation() {
        let (backend, frontend) = ScopeBackend::new(ScopeConfig::default());

        assert!(backend.running.load(Ordering::SeqCst));
        assert!(frontend.send_command(BackendCommand::Shutdown));
    }

    #[test]
    fn test_frontend_handle_commands() {
        let (_backend, frontend) = ScopeBackend::new(ScopeConfig::default());

        frontend.start("/dev/ttyUSB0".to_string(), 115_200, None);
        frontend.set_redraw_every(5);
        frontend.place_cursor(0);
        frontend.reset_cursors();
        frontend.stop();
        frontend.shutdown();
    }

    #[test]
    fn test_buffers_shared_with_host() {
        let (backend, _frontend) = ScopeBackend::new(ScopeConfig::default());
        let buffers = backend.buffers();
        assert!(buffers.read().unwrap().is_empty());
    }
}
