//! Backend worker thread
//!
//! The worker loop alternates between draining host commands and ticking
//! the acquisition engine, sleeping between iterations to hold a steady
//! tick cadence. Engine events (redraws, channel establishment, stop) are
//! forwarded to the host as [`BackendMessage`]s with `try_send` so a slow
//! host never blocks acquisition.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::backend::{BackendCommand, BackendMessage};
use crate::buffer::SharedBuffers;
use crate::config::ScopeConfig;
use crate::engine::{AcquisitionEngine, EngineEvent};
use crate::session::{write_session, SessionData};
use crate::sink::{CsvSink, RecordSink};
use crate::transport::TransportFactory;
use crate::types::EngineState;

/// Target interval between engine ticks
const TICK_INTERVAL: Duration = Duration::from_millis(5);

/// How often a stats snapshot is pushed to the host while reading
const STATS_INTERVAL: Duration = Duration::from_millis(500);

/// The backend worker that runs the acquisition loop
pub struct BackendWorker {
    command_rx: Receiver<BackendCommand>,
    message_tx: Sender<BackendMessage>,
    transport_factory: TransportFactory,
    engine: AcquisitionEngine,
    /// Events the engine emitted during the last tick
    event_rx: Receiver<EngineEvent>,
    running: Arc<AtomicBool>,
    last_tick: Instant,
    last_stats: Instant,
}

impl BackendWorker {
    pub fn new(
        config: ScopeConfig,
        command_rx: Receiver<BackendCommand>,
        message_tx: Sender<BackendMessage>,
        transport_factory: TransportFactory,
        buffers: SharedBuffers,
        running: Arc<AtomicBool>,
    ) -> Self {
        let mut engine = AcquisitionEngine::with_buffers(buffers, config.redraw_every);
        let (event_tx, event_rx) = crossbeam_channel::bounded(1024);
        engine.set_event_sender(event_tx);

        Self {
            command_rx,
            message_tx,
            transport_factory,
            engine,
            event_rx,
            running,
            last_tick: Instant::now(),
            last_stats: Instant::now(),
        }
    }

    /// Run the worker loop until shutdown
    pub fn run(&mut self) {
        tracing::info!("Acquisition worker started");

        while self.running.load(Ordering::SeqCst) {
            self.process_commands();

            if self.engine.is_reading() {
                if let Err(e) = self.engine.tick() {
                    let msg = if matches!(e, crate::error::ScopeError::Transport(_)) {
                        BackendMessage::TransportError(e.to_string())
                    } else {
                        BackendMessage::SessionError(e.to_string())
                    };
                    let _ = self.message_tx.send(msg);
                }
                if self.last_stats.elapsed() >= STATS_INTERVAL {
                    self.send_stats();
                    self.last_stats = Instant::now();
                }
            }
            self.forward_events();

            self.rate_limit();
        }

        let _ = self.engine.stop();
        self.forward_events();
        let _ = self.message_tx.send(BackendMessage::Shutdown);
        tracing::info!("Acquisition worker stopped");
    }

    /// Drain pending host commands
    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: BackendCommand) {
        match cmd {
            BackendCommand::Start {
                port,
                baud_rate,
                log_path,
            } => {
                self.handle_start(&port, baud_rate, log_path.as_deref());
            }
            BackendCommand::Stop => {
                if let Err(e) = self.engine.stop() {
                    tracing::warn!("Error while stopping: {}", e);
                }
                self.send_state();
            }
            BackendCommand::SetRedrawEvery(every) => {
                if let Err(e) = self.engine.set_redraw_every(every) {
                    tracing::warn!("Rejected redraw interval {}: {}", every, e);
                }
            }
            BackendCommand::SetMaxSamples(max_samples) => {
                if let Err(e) = self.engine.set_max_samples(max_samples) {
                    tracing::warn!("Rejected buffer capacity {}: {}", max_samples, e);
                }
            }
            BackendCommand::PlaceCursor(index) => {
                self.engine.place_cursor(index);
                self.send_measurement();
            }
            BackendCommand::MoveCursor { id, index } => {
                if self.engine.move_cursor(id, index) {
                    self.send_measurement();
                }
            }
            BackendCommand::ResetCursors => {
                self.engine.reset_cursors();
                self.send_measurement();
            }
            BackendCommand::LoadSession(path) => {
                let result = SessionData::load(&path)
                    .and_then(|session| self.engine.load_session(session));
                if let Err(e) = result {
                    tracing::error!("Session import failed: {}", e);
                    let _ = self
                        .message_tx
                        .send(BackendMessage::SessionError(e.to_string()));
                }
            }
            BackendCommand::SaveSession(path) => {
                let buffers = self.engine.buffers();
                let result = match buffers.read() {
                    Ok(buffers) => write_session(&path, &buffers),
                    Err(_) => Err(crate::error::ScopeError::Channel(
                        "Sample buffer lock poisoned".to_string(),
                    )),
                };
                if let Err(e) = result {
                    tracing::error!("Session export failed: {}", e);
                    let _ = self
                        .message_tx
                        .send(BackendMessage::SessionError(e.to_string()));
                }
            }
            BackendCommand::RefreshPorts => {
                let ports = crate::transport::list_ports().unwrap_or_default();
                let _ = self.message_tx.send(BackendMessage::PortList(ports));
            }
            BackendCommand::RequestStats => {
                self.send_stats();
            }
            BackendCommand::Shutdown => {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    fn handle_start(&mut self, port: &str, baud_rate: u32, log_path: Option<&std::path::Path>) {
        let transport = match (self.transport_factory)(port, baud_rate) {
            Ok(transport) => transport,
            Err(e) => {
                tracing::error!("Failed to open {}: {}", port, e);
                let _ = self
                    .message_tx
                    .send(BackendMessage::TransportError(e.to_string()));
                return;
            }
        };

        let sink: Option<Box<dyn RecordSink>> = match log_path {
            Some(path) => match CsvSink::create(path) {
                Ok(sink) => Some(Box::new(sink)),
                Err(e) => {
                    tracing::error!("Failed to create log file {:?}: {}", path, e);
                    let _ = self
                        .message_tx
                        .send(BackendMessage::SessionError(e.to_string()));
                    return;
                }
            },
            None => None,
        };

        if let Err(e) = self.engine.start(transport, sink) {
            let _ = self
                .message_tx
                .send(BackendMessage::TransportError(e.to_string()));
            return;
        }
        self.send_state();
    }

    /// Forward engine events to the host, coalescing redundant redraws
    fn forward_events(&mut self) {
        let mut redraw = false;
        let mut stopped = false;
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                EngineEvent::RedrawNeeded => redraw = true,
                EngineEvent::ChannelsEstablished(count) => {
                    let _ = self
                        .message_tx
                        .try_send(BackendMessage::ChannelsEstablished(count));
                }
                EngineEvent::Stopped => stopped = true,
            }
        }
        if redraw {
            let _ = self.message_tx.try_send(BackendMessage::Redraw);
            self.send_measurement();
        }
        if stopped {
            let _ = self.message_tx.try_send(BackendMessage::State(EngineState::Idle));
        }
    }

    fn send_state(&self) {
        let _ = self
            .message_tx
            .try_send(BackendMessage::State(self.engine.state()));
    }

    fn send_stats(&self) {
        let _ = self
            .message_tx
            .try_send(BackendMessage::Stats(self.engine.stats()));
    }

    fn send_measurement(&self) {
        let _ = self
            .message_tx
            .try_send(BackendMessage::Measurement(self.engine.measurement()));
    }

    /// Sleep out the remainder of the tick interval
    fn rate_limit(&mut self) {
        let elapsed = self.last_tick.elapsed();
        if elapsed < TICK_INTERVAL {
            std::thread::sleep(TICK_INTERVAL - elapsed);
        }
        self.last_tick = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScopeBackend;
    use crate::transport::{MockTransport, Transport};

    fn mock_factory(lines: Vec<String>) -> TransportFactory {
        Box::new(move |_port, _baud| {
            let transport: Box<dyn Transport> =
                Box::new(MockTransport::with_lines(lines.iter().map(String::as_str)));
            Ok(transport)
        })
    }

    fn drain_until_shutdown(frontend: &crate::backend::FrontendHandle) -> Vec<BackendMessage> {
        let mut messages = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            match frontend.receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(BackendMessage::Shutdown) => {
                    messages.push(BackendMessage::Shutdown);
                    return messages;
                }
                Ok(msg) => messages.push(msg),
                Err(_) => {}
            }
        }
        messages
    }

    #[test]
    fn test_worker_full_run() {
        let lines: Vec<String> = (0..20).map(|i| format!("{}.0,{}.5", i, i)).collect();
        let config = ScopeConfig::default();
        let (backend, frontend) =
            ScopeBackend::with_transport_factory(config, mock_factory(lines));
        let buffers = backend.buffers();

        let handle = std::thread::spawn(move || backend.run());
        frontend.start("mock".to_string(), 115_200, None);
        // Give the worker a few ticks to drain the scripted lines
        std::thread::sleep(Duration::from_millis(100));
        frontend.stop();
        frontend.shutdown();

        let messages = drain_until_shutdown(&frontend);
        handle.join().unwrap();

        assert!(messages
            .iter()
            .any(|m| matches!(m, BackendMessage::ChannelsEstablished(2))));
        assert!(messages.iter().any(|m| matches!(m, BackendMessage::Redraw)));
        assert!(matches!(messages.last(), Some(BackendMessage::Shutdown)));

        let buffers = buffers.read().unwrap();
        assert_eq!(buffers.channel_count(), 2);
        assert_eq!(buffers.len(), 20);
    }

    #[test]
    fn test_worker_transport_open_failure() {
        let factory: TransportFactory = Box::new(|port, _baud| {
            Err(crate::error::ScopeError::Transport(format!(
                "no such port: {}",
                port
            )))
        });
        let (backend, frontend) =
            ScopeBackend::with_transport_factory(ScopeConfig::default(), factory);

        let handle = std::thread::spawn(move || backend.run());
        frontend.start("missing".to_string(), 115_200, None);
        std::thread::sleep(Duration::from_millis(50));
        frontend.shutdown();

        let messages = drain_until_shutdown(&frontend);
        handle.join().unwrap();

        assert!(messages
            .iter()
            .any(|m| matches!(m, BackendMessage::TransportError(_))));
    }

    #[test]
    fn test_worker_cursor_commands() {
        let lines: Vec<String> = (0..5).map(|i| format!("{}.0", i)).collect();
        let (backend, frontend) =
            ScopeBackend::with_transport_factory(ScopeConfig::default(), mock_factory(lines));

        let handle = std::thread::spawn(move || backend.run());
        frontend.start("mock".to_string(), 115_200, None);
        std::thread::sleep(Duration::from_millis(100));
        frontend.place_cursor(0);
        frontend.place_cursor(3);
        std::thread::sleep(Duration::from_millis(50));
        frontend.shutdown();

        let messages = drain_until_shutdown(&frontend);
        handle.join().unwrap();

        let readout = messages.iter().rev().find_map(|m| match m {
            BackendMessage::Measurement(r) => Some(r.clone()),
            _ => None,
        });
        let readout = readout.expect("no measurement message received");
        assert!(readout.first.is_some());
        assert!(readout.second.is_some());
        assert!(readout.delta.is_some());
    }

    #[test]
    fn test_worker_shutdown_on_disconnected_commands() {
        let (backend, frontend) =
            ScopeBackend::with_transport_factory(ScopeConfig::default(), mock_factory(vec![]));
        let handle = std::thread::spawn(move || backend.run());

        // Dropping the handle closes the command channel; the worker
        // must notice and exit on its own
        drop(frontend);

        handle.join().unwrap();
    }
}
