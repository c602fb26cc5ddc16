//! The acquisition engine: one tick drains the transport, parses lines,
//! fills the shared windows, logs rows, and throttles redraw signals.
//!
//! The engine is scheduler-agnostic. It never spawns threads or sleeps;
//! a host calls [`AcquisitionEngine::tick`] at whatever cadence it likes
//! (the threaded [`crate::backend`] worker calls it every few
//! milliseconds) and each tick drains everything the transport has
//! buffered. That keeps the engine deterministic and directly testable
//! against a scripted [`crate::transport::MockTransport`].

use chrono::Local;
use crossbeam_channel::Sender;
use std::time::Duration;

use crate::buffer::{ScopeBuffers, SharedBuffers};
use crate::cursor::{CursorId, MeasurementPair, MeasurementReadout};
use crate::error::{Result, ScopeError};
use crate::parser::parse_line;
use crate::session::SessionData;
use crate::sink::RecordSink;
use crate::throttle::RenderThrottle;
use crate::transport::Transport;
use crate::types::{AcquisitionStats, ChannelCount, EngineState};

/// How long a single in-tick line read may wait for a terminator once
/// `bytes_available` reported data
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Notifications the engine emits toward its host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The redraw threshold was crossed; the host should repaint from the
    /// shared buffers
    RedrawNeeded,
    /// First valid line fixed the channel arity for this run
    ChannelsEstablished(usize),
    /// Acquisition ended (user stop or transport failure)
    Stopped,
}

/// Single-writer acquisition core. Owns the transport and sink for the
/// duration of a run; shares the sample windows with readers via
/// [`SharedBuffers`].
pub struct AcquisitionEngine {
    state: EngineState,
    transport: Option<Box<dyn Transport>>,
    sink: Option<Box<dyn RecordSink>>,
    buffers: SharedBuffers,
    channel_count: ChannelCount,
    throttle: RenderThrottle,
    cursors: MeasurementPair,
    stats: AcquisitionStats,
    events: Option<Sender<EngineEvent>>,
}

impl AcquisitionEngine {
    pub fn new(max_samples: usize, redraw_every: u32) -> Self {
        Self::with_buffers(ScopeBuffers::shared(max_samples), redraw_every)
    }

    /// Build an engine writing into externally owned windows (the
    /// threaded backend shares its buffers with the host this way)
    pub fn with_buffers(buffers: SharedBuffers, redraw_every: u32) -> Self {
        let cursors = MeasurementPair::new(buffers.clone());
        Self {
            state: EngineState::Idle,
            transport: None,
            sink: None,
            buffers,
            channel_count: ChannelCount::Pending,
            throttle: RenderThrottle::new(redraw_every),
            cursors,
            stats: AcquisitionStats::default(),
            events: None,
        }
    }

    /// Attach a channel the engine will emit [`EngineEvent`]s on. Events
    /// are sent best-effort with `try_send`; a full channel drops the
    /// event and counts it in the stats.
    pub fn set_event_sender(&mut self, sender: Sender<EngineEvent>) {
        self.events = Some(sender);
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_reading(&self) -> bool {
        self.state == EngineState::Reading
    }

    pub fn buffers(&self) -> SharedBuffers {
        self.buffers.clone()
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    pub fn channel_count(&self) -> ChannelCount {
        self.channel_count
    }

    /// Begin a run: discard any prior window contents, reset the channel
    /// arity and cursors, and transition to `Reading`.
    pub fn start(
        &mut self,
        transport: Box<dyn Transport>,
        sink: Option<Box<dyn RecordSink>>,
    ) -> Result<()> {
        if self.state == EngineState::Reading {
            return Err(ScopeError::Channel(
                "Acquisition already running".to_string(),
            ));
        }
        match self.buffers.write() {
            Ok(mut buffers) => buffers.clear(),
            Err(_) => {
                return Err(ScopeError::Channel(
                    "Sample buffer lock poisoned".to_string(),
                ))
            }
        }
        self.channel_count = ChannelCount::Pending;
        self.throttle.reset();
        self.cursors.reset();
        self.stats = AcquisitionStats::default();
        self.transport = Some(transport);
        self.sink = sink;
        self.state = EngineState::Reading;
        tracing::info!("Acquisition started");
        Ok(())
    }

    /// End the run. Flushes and releases the sink and transport; the
    /// captured windows stay in place for inspection and export.
    pub fn stop(&mut self) -> Result<()> {
        if self.state == EngineState::Idle {
            return Ok(());
        }
        self.state = EngineState::Idle;
        let flush_result = match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        };
        self.sink = None;
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.emit(EngineEvent::Stopped);
        tracing::info!(
            accepted = self.stats.accepted_samples,
            skipped = self.stats.skipped_lines,
            "Acquisition stopped"
        );
        flush_result
    }

    /// One scheduler tick: drain every complete line the transport has
    /// buffered. Returns the number of samples accepted this tick.
    ///
    /// A transport or sink failure aborts the run (sink flushed, transport
    /// released, captured data retained) and propagates the error.
    pub fn tick(&mut self) -> Result<usize> {
        if self.state != EngineState::Reading {
            return Ok(0);
        }
        match self.drain() {
            Ok(accepted) => Ok(accepted),
            Err(err) => {
                // Attribute the abort correctly: a full disk is not a
                // device failure
                if matches!(err, ScopeError::Transport(_)) {
                    self.stats.transport_errors += 1;
                    tracing::error!("Transport failure, aborting acquisition: {}", err);
                } else {
                    self.stats.sink_errors += 1;
                    tracing::error!("Sink failure, aborting acquisition: {}", err);
                }
                let _ = self.stop();
                Err(err)
            }
        }
    }

    fn drain(&mut self) -> Result<usize> {
        let mut accepted = 0;
        loop {
            let transport = match self.transport.as_mut() {
                Some(t) => t,
                None => break,
            };
            if transport.bytes_available()? == 0 {
                break;
            }
            match transport.read_line(READ_TIMEOUT)? {
                Some(line) => {
                    if self.ingest_line(&line)? {
                        accepted += 1;
                    }
                }
                // Bytes present but no terminator yet; wait for the next tick
                None => break,
            }
        }
        Ok(accepted)
    }

    /// Parse and apply one raw line. Returns whether it was accepted.
    fn ingest_line(&mut self, line: &str) -> Result<bool> {
        let values = match parse_line(line) {
            Ok(values) => values,
            Err(rejection) => {
                self.stats.skipped_lines += 1;
                tracing::trace!("Skipping line: {}", rejection);
                return Ok(false);
            }
        };

        if !self.channel_count.accepts(values.len()) {
            self.stats.skipped_lines += 1;
            tracing::trace!(
                expected = ?self.channel_count.get(),
                got = values.len(),
                "Skipping line with mismatched channel count"
            );
            return Ok(false);
        }

        if !self.channel_count.is_established() {
            self.establish_channels(values.len())?;
        }

        let timestamp = Local::now();
        match self.buffers.write() {
            Ok(mut buffers) => buffers.push_sample(timestamp, &values),
            Err(_) => {
                return Err(ScopeError::Channel(
                    "Sample buffer lock poisoned".to_string(),
                ))
            }
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.append(&timestamp, &values)?;
        }
        self.stats.accepted_samples += 1;

        if self.throttle.tick().fired() {
            self.cursors.refresh();
            self.stats.redraws_signalled += 1;
            self.emit(EngineEvent::RedrawNeeded);
        }
        Ok(true)
    }

    fn establish_channels(&mut self, count: usize) -> Result<()> {
        match self.buffers.write() {
            Ok(mut buffers) => buffers.allocate_channels(count),
            Err(_) => {
                return Err(ScopeError::Channel(
                    "Sample buffer lock poisoned".to_string(),
                ))
            }
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.write_header(count)?;
        }
        self.channel_count = ChannelCount::Established(count);
        tracing::info!(channels = count, "Channel count established");
        self.emit(EngineEvent::ChannelsEstablished(count));
        Ok(())
    }

    /// Replace the window contents with a previously saved session.
    /// Rejected while a run is active; on success the cursors are reset
    /// and the channel arity matches the imported file.
    pub fn load_session(&mut self, session: SessionData) -> Result<()> {
        if self.state == EngineState::Reading {
            return Err(ScopeError::Import(
                "Cannot import a session while acquiring".to_string(),
            ));
        }
        let channels = session.channel_count();
        match self.buffers.write() {
            Ok(mut buffers) => buffers.replace(session.timestamps, session.channels),
            Err(_) => {
                return Err(ScopeError::Channel(
                    "Sample buffer lock poisoned".to_string(),
                ))
            }
        }
        self.channel_count = ChannelCount::Established(channels);
        self.cursors.reset();
        self.emit(EngineEvent::ChannelsEstablished(channels));
        self.emit(EngineEvent::RedrawNeeded);
        tracing::info!(channels, "Session imported");
        Ok(())
    }

    /// Change the window capacity. Truncation of over-full windows is
    /// deferred to the next accepted sample.
    pub fn set_max_samples(&mut self, max_samples: usize) -> Result<()> {
        if max_samples == 0 {
            return Err(ScopeError::Config(
                "Buffer capacity must be at least 1".to_string(),
            ));
        }
        match self.buffers.write() {
            Ok(mut buffers) => buffers.set_capacity(max_samples),
            Err(_) => {
                return Err(ScopeError::Channel(
                    "Sample buffer lock poisoned".to_string(),
                ))
            }
        }
        Ok(())
    }

    /// Change the redraw threshold; takes effect on the next accepted
    /// sample without resetting the in-progress count.
    pub fn set_redraw_every(&mut self, every: u32) -> Result<()> {
        self.throttle.set_every(every)
    }

    pub fn redraw_every(&self) -> u32 {
        self.throttle.every()
    }

    // Cursor interaction is forwarded so the host has one mutation
    // surface for the whole acquisition core.

    pub fn place_cursor(&mut self, index: usize) -> CursorId {
        self.cursors.place(index)
    }

    pub fn move_cursor(&mut self, id: CursorId, index: usize) -> bool {
        self.cursors.move_cursor(id, index)
    }

    pub fn reset_cursors(&mut self) {
        self.cursors.reset();
    }

    pub fn measurement(&self) -> MeasurementReadout {
        self.cursors.readout()
    }

    pub fn cursors_mut(&mut self) -> &mut MeasurementPair {
        &mut self.cursors
    }

    fn emit(&mut self, event: EngineEvent) {
        if let Some(sender) = &self.events {
            if sender.try_send(event).is_err() {
                self.stats.dropped_events += 1;
            }
        }
    }
}

impl Drop for AcquisitionEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::transport::MockTransport;

    fn engine() -> AcquisitionEngine {
        AcquisitionEngine::new(1000, 10)
    }

    fn drained(lines: &[&str]) -> MockTransport {
        MockTransport::with_lines(lines.iter().copied())
    }

    #[test]
    fn test_tick_idle_is_noop() {
        let mut engine = engine();
        assert_eq!(engine.tick().unwrap(), 0);
    }

    #[test]
    fn test_first_line_establishes_channels() {
        let mut engine = engine();
        engine
            .start(Box::new(drained(&["1.0,2.0,3.0"])), None)
            .unwrap();
        assert_eq!(engine.tick().unwrap(), 1);
        assert_eq!(engine.channel_count(), ChannelCount::Established(3));
        let buffers = engine.buffers();
        let buffers = buffers.read().unwrap();
        assert_eq!(buffers.channel_count(), 3);
        assert_eq!(buffers.len(), 1);
    }

    #[test]
    fn test_malformed_and_mismatched_lines_skipped() {
        let mut engine = engine();
        engine
            .start(
                Box::new(drained(&["1.0,2.0", "oops,2.0", "7.0", "3.0,4.0"])),
                None,
            )
            .unwrap();
        assert_eq!(engine.tick().unwrap(), 2);
        assert_eq!(engine.stats().accepted_samples, 2);
        assert_eq!(engine.stats().skipped_lines, 2);
        let buffers = engine.buffers();
        let buffers = buffers.read().unwrap();
        assert_eq!(buffers.channel(0).unwrap().get(1), Some(3.0));
        assert_eq!(buffers.channel(1).unwrap().get(1), Some(4.0));
    }

    #[test]
    fn test_sink_receives_header_and_rows() {
        let mut engine = engine();
        engine
            .start(
                Box::new(drained(&["1.0,2.0", "bad", "3.0,4.0"])),
                Some(Box::new(MemorySink::new())),
            )
            .unwrap();
        engine.tick().unwrap();
        // Sink is consumed on stop; capture expectations through stats
        assert_eq!(engine.stats().accepted_samples, 2);
        assert_eq!(engine.stats().skipped_lines, 1);
    }

    mockall::mock! {
        Sink {}
        impl RecordSink for Sink {
            fn write_header(&mut self, channels: usize) -> crate::error::Result<()>;
            fn append(
                &mut self,
                timestamp: &chrono::DateTime<Local>,
                values: &[f64],
            ) -> crate::error::Result<()>;
            fn flush(&mut self) -> crate::error::Result<()>;
        }
    }

    #[test]
    fn test_sink_call_sequence() {
        let mut sink = MockSink::new();
        sink.expect_write_header()
            .withf(|&channels| channels == 2)
            .times(1)
            .returning(|_| Ok(()));
        sink.expect_append()
            .withf(|_, values| values.len() == 2)
            .times(2)
            .returning(|_, _| Ok(()));
        sink.expect_flush().times(1).returning(|| Ok(()));

        let mut engine = engine();
        engine
            .start(
                Box::new(drained(&["1.0,2.0", "nope", "3.0,4.0"])),
                Some(Box::new(sink)),
            )
            .unwrap();
        engine.tick().unwrap();
        engine.stop().unwrap();
    }

    #[test]
    fn test_redraw_throttle_fires_every_n() {
        let lines: Vec<String> = (0..25).map(|i| format!("{}.0", i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let mut engine = AcquisitionEngine::new(1000, 10);
        engine.start(Box::new(drained(&refs)), None).unwrap();
        engine.tick().unwrap();
        assert_eq!(engine.stats().accepted_samples, 25);
        assert_eq!(engine.stats().redraws_signalled, 2);
    }

    #[test]
    fn test_sink_error_counted_separately_from_transport() {
        let mut sink = MockSink::new();
        sink.expect_write_header().returning(|_| Ok(()));
        sink.expect_append()
            .returning(|_, _| Err(ScopeError::Io(std::io::Error::other("disk full"))));
        sink.expect_flush().returning(|| Ok(()));

        let mut engine = engine();
        engine
            .start(Box::new(drained(&["1.0"])), Some(Box::new(sink)))
            .unwrap();
        let err = engine.tick().unwrap_err();
        assert!(matches!(err, ScopeError::Io(_)));
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.stats().sink_errors, 1);
        assert_eq!(engine.stats().transport_errors, 0);
    }

    #[test]
    fn test_transport_error_aborts_run_keeps_data() {
        let transport = MockTransport::with_lines(["1.0"]).fail_when_drained("device gone");
        let mut engine = engine();
        engine.start(Box::new(transport), None).unwrap();
        let err = engine.tick().unwrap_err();
        assert!(matches!(err, ScopeError::Transport(_)));
        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(engine.stats().transport_errors, 1);
        let buffers = engine.buffers();
        assert_eq!(buffers.read().unwrap().len(), 1);
    }

    #[test]
    fn test_stop_retains_data_and_restart_clears() {
        let mut engine = engine();
        engine.start(Box::new(drained(&["1.0", "2.0"])), None).unwrap();
        engine.tick().unwrap();
        engine.stop().unwrap();
        assert_eq!(engine.buffers().read().unwrap().len(), 2);

        engine.start(Box::new(drained(&["9.0"])), None).unwrap();
        assert_eq!(engine.buffers().read().unwrap().len(), 0);
        engine.tick().unwrap();
        assert_eq!(engine.buffers().read().unwrap().len(), 1);
    }

    #[test]
    fn test_start_while_reading_rejected() {
        let mut engine = engine();
        engine.start(Box::new(drained(&[])), None).unwrap();
        assert!(engine.start(Box::new(drained(&[])), None).is_err());
    }

    #[test]
    fn test_load_session_rejected_while_reading() {
        let mut engine = engine();
        engine.start(Box::new(drained(&[])), None).unwrap();
        let session = SessionData {
            timestamps: vec![],
            channels: vec![],
        };
        assert!(engine.load_session(session).is_err());
    }

    #[test]
    fn test_load_session_replaces_and_establishes() {
        let mut engine = engine();
        let base = Local::now();
        let session = SessionData {
            timestamps: vec![base, base + chrono::Duration::milliseconds(10)],
            channels: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
        };
        engine.load_session(session).unwrap();
        assert_eq!(engine.channel_count(), ChannelCount::Established(2));
        let buffers = engine.buffers();
        let buffers = buffers.read().unwrap();
        assert_eq!(buffers.len(), 2);
        assert_eq!(buffers.channel(1).unwrap().get(0), Some(3.0));
    }

    #[test]
    fn test_events_emitted() {
        let (tx, rx) = crossbeam_channel::bounded(64);
        let mut engine = engine();
        engine.set_event_sender(tx);
        let lines: Vec<String> = (0..10).map(|i| format!("{}.0", i)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        engine.start(Box::new(drained(&refs)), None).unwrap();
        engine.tick().unwrap();
        engine.stop().unwrap();

        let events: Vec<EngineEvent> = rx.try_iter().collect();
        assert_eq!(events[0], EngineEvent::ChannelsEstablished(1));
        assert!(events.contains(&EngineEvent::RedrawNeeded));
        assert_eq!(*events.last().unwrap(), EngineEvent::Stopped);
    }
}
