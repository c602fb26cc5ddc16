//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

use serialscope_rs::transport::{MockTransport, Transport, TransportFactory};
use std::sync::Once;
use std::time::Duration;

static TRACING: Once = Once::new();

/// Install a test subscriber once; honors `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Standard wait for the worker thread to chew through scripted input
pub fn settle() {
    std::thread::sleep(Duration::from_millis(100));
}

/// Assert two floats are approximately equal
pub fn assert_float_eq(a: f64, b: f64, epsilon: f64) {
    assert!(
        (a - b).abs() < epsilon,
        "Expected {} to be approximately equal to {} (epsilon: {})",
        a,
        b,
        epsilon
    );
}

/// Build a transport factory that hands out one scripted mock transport
pub fn scripted_factory(lines: Vec<String>) -> TransportFactory {
    Box::new(move |_port, _baud| {
        let transport: Box<dyn Transport> =
            Box::new(MockTransport::with_lines(lines.iter().map(String::as_str)));
        Ok(transport)
    })
}

/// Generate `count` well-formed two-channel sample lines
pub fn two_channel_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{}.0,{}.5", i, i))
        .collect()
}
