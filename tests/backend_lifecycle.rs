//! Integration tests for the threaded backend lifecycle
//!
//! These tests validate the complete backend workflow over the public
//! channel API: start/stop, message flow, and clean shutdown.

mod common;

use serialscope_rs::backend::{BackendMessage, ScopeBackend};
use serialscope_rs::config::ScopeConfig;
use serialscope_rs::types::EngineState;
use std::thread;
use std::time::{Duration, Instant};

fn collect_until_shutdown(
    frontend: &serialscope_rs::FrontendHandle,
) -> Vec<BackendMessage> {
    let mut messages = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        match frontend.receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(BackendMessage::Shutdown) => {
                messages.push(BackendMessage::Shutdown);
                break;
            }
            Ok(msg) => messages.push(msg),
            Err(_) => {}
        }
    }
    messages
}

#[test]
fn test_backend_creation_and_shutdown() {
    common::init_tracing();
    let (backend, frontend) = ScopeBackend::new(ScopeConfig::default());

    let handle = thread::spawn(move || backend.run());
    common::settle();
    frontend.shutdown();

    let result = handle.join();
    assert!(result.is_ok(), "Backend thread should exit cleanly");
}

#[test]
fn test_full_acquisition_over_channels() {
    common::init_tracing();
    let lines = common::two_channel_lines(30);
    let (backend, frontend) = ScopeBackend::with_transport_factory(
        ScopeConfig::default(),
        common::scripted_factory(lines),
    );
    let buffers = backend.buffers();

    let handle = thread::spawn(move || backend.run());

    frontend.start("mock".to_string(), 115_200, None);
    common::settle();
    frontend.stop();
    frontend.shutdown();

    let messages = collect_until_shutdown(&frontend);
    handle.join().unwrap();

    assert!(messages
        .iter()
        .any(|m| matches!(m, BackendMessage::State(EngineState::Reading))));
    assert!(messages
        .iter()
        .any(|m| matches!(m, BackendMessage::ChannelsEstablished(2))));
    assert!(messages.iter().any(|m| matches!(m, BackendMessage::Redraw)));
    assert!(messages
        .iter()
        .any(|m| matches!(m, BackendMessage::State(EngineState::Idle))));

    // Data outlives the run and is visible through the shared handle
    let buffers = buffers.read().unwrap();
    assert_eq!(buffers.channel_count(), 2);
    assert_eq!(buffers.len(), 30);
    common::assert_float_eq(buffers.channel(1).unwrap().get(0).unwrap(), 0.5, 1e-9);
}

#[test]
fn test_session_save_and_reload_over_channels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.csv");

    let lines = common::two_channel_lines(5);
    let (backend, frontend) = ScopeBackend::with_transport_factory(
        ScopeConfig::default(),
        common::scripted_factory(lines),
    );
    let buffers = backend.buffers();

    let handle = thread::spawn(move || backend.run());

    frontend.start("mock".to_string(), 115_200, None);
    common::settle();
    frontend.stop();
    common::settle();
    frontend.save_session(path.clone());
    common::settle();
    frontend.load_session(path.clone());
    common::settle();
    frontend.shutdown();

    let messages = collect_until_shutdown(&frontend);
    handle.join().unwrap();

    assert!(
        !messages
            .iter()
            .any(|m| matches!(m, BackendMessage::SessionError(_))),
        "round-trip produced a session error"
    );
    let buffers = buffers.read().unwrap();
    assert_eq!(buffers.channel_count(), 2);
    assert_eq!(buffers.len(), 5);
}

#[test]
fn test_stats_on_request() {
    let lines = common::two_channel_lines(10);
    let (backend, frontend) = ScopeBackend::with_transport_factory(
        ScopeConfig::default(),
        common::scripted_factory(lines),
    );

    let handle = thread::spawn(move || backend.run());
    frontend.start("mock".to_string(), 115_200, None);
    common::settle();
    frontend.send_command(serialscope_rs::BackendCommand::RequestStats);
    common::settle();
    frontend.shutdown();

    let messages = collect_until_shutdown(&frontend);
    handle.join().unwrap();

    let stats = messages.iter().find_map(|m| match m {
        BackendMessage::Stats(s) => Some(*s),
        _ => None,
    });
    let stats = stats.expect("no stats message received");
    assert_eq!(stats.accepted_samples, 10);
    assert_eq!(stats.skipped_lines, 0);
}
