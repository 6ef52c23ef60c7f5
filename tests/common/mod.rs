//! Shared test utilities for pagetape integration tests.

use std::time::Duration;

use once_cell::sync::Lazy;

use pagetape::page::mock::MockPage;
use pagetape::page::PageEnvironment;
use pagetape::{CustomData, NetworkPayload, Recorder, SessionBuffer, SessionEvent};

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

/// A mock page plus an initialized recorder over it.
pub fn recorder_at(url: &str) -> (MockPage, Recorder) {
    Lazy::force(&TRACING);
    let (page, environment): (MockPage, PageEnvironment) = MockPage::new(url);
    let recorder = Recorder::init(environment).expect("recorder init");
    (page, recorder)
}

/// Extracts the network payloads from a session dump, preserving order.
pub fn network_payloads(events: &[SessionEvent]) -> Vec<NetworkPayload> {
    events
        .iter()
        .filter_map(|event| event.as_custom())
        .filter_map(|custom| match &custom.data {
            CustomData::Network(payload) => Some(payload.clone()),
            _ => None,
        })
        .collect()
}

/// Polls until the buffer holds at least `count` events, or panics after a
/// bounded wait. Works under both running and paused clocks.
pub async fn wait_for_events(buffer: &SessionBuffer, count: usize) {
    for _ in 0..200 {
        if buffer.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "timed out waiting for {count} events; buffer has {}",
        buffer.len()
    );
}
