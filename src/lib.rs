//! # SerialScope-RS: Serial Line-Stream Acquisition Engine
//!
//! A real-time acquisition core for delimiter-separated numeric streams
//! arriving over a serial port (the classic Arduino `Serial.println`
//! format: one sample per line, comma-separated channels). The
//! architecture separates a threaded acquisition backend from whatever
//! rendering frontend a host brings.
//!
//! ## Architecture
//!
//! - **Transport**: Line-oriented serial IO via serialport, behind a
//!   trait so tests run against scripted mocks
//! - **Engine**: Scheduler-agnostic tick loop that parses lines, fills
//!   bounded per-channel windows, logs CSV rows, and throttles redraws
//! - **Backend**: A worker thread driving the engine, talking to the
//!   host over crossbeam channels
//! - **Cursors**: Dual measurement markers with a derived Δt readout
//!
//! ## Configuration
//!
//! Settings persist in the platform-appropriate data directory under
//! `serialscope-rs`:
//!
//! - **Linux**: `~/.local/share/serialscope-rs/`
//! - **macOS**: `~/Library/Application Support/serialscope-rs/`
//! - **Windows**: `%APPDATA%\serialscope-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use serialscope_rs::{
//!     backend::{BackendMessage, ScopeBackend},
//!     config::ScopeConfig,
//! };
//!
//! let config = ScopeConfig::load_or_default();
//! let (backend, frontend) = ScopeBackend::new(config);
//! let buffers = backend.buffers();
//!
//! std::thread::spawn(move || backend.run());
//!
//! frontend.start("/dev/ttyUSB0".to_string(), 115_200, None);
//! loop {
//!     for msg in frontend.drain() {
//!         match msg {
//!             BackendMessage::Redraw => {
//!                 let buffers = buffers.read().unwrap();
//!                 // repaint channel curves from `buffers`
//!             }
//!             BackendMessage::Measurement(readout) => {
//!                 println!("{}", readout.delta_label());
//!             }
//!             _ => {}
//!         }
//!     }
//! }
//! ```

pub mod backend;
pub mod buffer;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod parser;
pub mod session;
pub mod sink;
pub mod throttle;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use backend::{BackendCommand, BackendMessage, FrontendHandle, ScopeBackend};
pub use buffer::{ScopeBuffers, SharedBuffers, DEFAULT_MAX_SAMPLES};
pub use config::ScopeConfig;
pub use cursor::{CursorId, CursorMarker, MeasurementPair, MeasurementReadout};
pub use engine::{AcquisitionEngine, EngineEvent};
pub use error::{Result, ScopeError};
pub use session::SessionData;
pub use sink::{CsvSink, RecordSink};
pub use throttle::{RenderThrottle, ThrottleSignal};
pub use transport::{MockTransport, SerialTransport, Transport};
pub use types::{AcquisitionStats, ChannelCount, EngineState, Sample};
