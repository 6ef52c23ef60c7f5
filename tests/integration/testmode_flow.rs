//! Test-mode flows: activation, HUD lifecycle, full-session relay.

use std::time::Duration;

use pagetape::net::{FetchRequest, FetchTransport};
use pagetape::page::{HistoryApi, SessionStore};
use pagetape::{OpenerMessage, SessionEvent, TEST_MODE_KEY};

use super::common::recorder_at;

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never became true");
}

#[tokio::test(start_paused = true)]
async fn testmode_query_flag_activates_and_persists() {
    let (page, recorder) = recorder_at("https://example.com/?testmode=1");
    assert!(recorder.test_mode().is_some());
    assert_eq!(page.storage.get(TEST_MODE_KEY).as_deref(), Some("true"));

    let hud = page.hud.clone();
    wait_until(move || hud.is_mounted()).await;
}

#[tokio::test(start_paused = true)]
async fn debug_flag_also_activates() {
    let (_page, recorder) = recorder_at("https://example.com/?debug=1");
    assert!(recorder.test_mode().is_some());
}

#[tokio::test]
async fn plain_session_has_no_test_mode() {
    let (page, recorder) = recorder_at("https://example.com/");
    assert!(recorder.test_mode().is_none());
    assert!(page.storage.get(TEST_MODE_KEY).is_none());
}

#[tokio::test(start_paused = true)]
async fn hud_mount_defers_until_body_exists() {
    let (page, recorder) = recorder_at("https://example.com/?testmode=1");
    // Simulate a slow document: the first mounts fail.
    page.hud.set_body_ready_after(5);
    let _ = recorder;

    let hud = page.hud.clone();
    wait_until(move || hud.is_mounted()).await;
    assert!(page.hud.mount_attempts() >= 5);
}

#[tokio::test(start_paused = true)]
async fn stop_relays_full_session_and_removes_indicator() {
    let (page, recorder) = recorder_at("https://example.com/?testmode=1");
    page.fetch.respond_json("/api/x", 200, r#"{"a":1}"#);

    let hud = page.hud.clone();
    wait_until(move || hud.is_mounted()).await;

    recorder
        .fetch()
        .fetch(FetchRequest::get("/api/x"))
        .await
        .unwrap();
    recorder.history().push_state("/page2");
    page.dom
        .emit(serde_json::json!({"type": 3, "data": {}, "timestamp": 9u64}));

    let controller = recorder.test_mode().expect("test mode active");
    controller.stop();

    // Stop halts the DOM layer.
    assert!(page.dom.stopped());

    // The opener receives exactly one full-session relay.
    let messages = page.opener.messages();
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        OpenerMessage::RrwebEvents { data } => {
            let parsed: Vec<SessionEvent> = serde_json::from_str(data).unwrap();
            assert_eq!(parsed, recorder.buffer().dump());
            assert_eq!(parsed.len(), 4);
        }
        other => panic!("expected rrweb_events, got {other:?}"),
    }

    // And the indicator is gone.
    assert!(page.hud.is_removed());
}

#[tokio::test(start_paused = true)]
async fn ticker_reports_elapsed_time_while_active() {
    let (page, recorder) = recorder_at("https://example.com/?testmode=1");

    let hud = page.hud.clone();
    wait_until(move || hud.is_mounted()).await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    let seen = page.hud.elapsed_values();
    assert!(seen.iter().any(|value| value == "00:00"));
    assert!(seen.iter().any(|value| value == "00:02"));

    recorder.test_mode().unwrap().stop();
}
