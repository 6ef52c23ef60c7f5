//! End-to-end recording flows: network correlation, navigation, uncaught
//! errors, export.

use std::collections::HashMap;

use pagetape::net::{FetchRequest, FetchTransport, XhrResponse, XhrResponseValue, XhrSignal};
use pagetape::page::{HistoryApi, PageSignal};
use pagetape::{
    BodyPayload, CustomData, NetworkApi, NetworkPayload, OpenerMessage, ResponseType, SessionEvent,
};

use super::common::{network_payloads, recorder_at, wait_for_events};

#[tokio::test]
async fn successful_fetch_yields_start_then_end() {
    let (page, recorder) = recorder_at("https://example.com/");
    page.fetch.respond_json("/api/x", 200, r#"{"a":1}"#);

    let response = recorder
        .fetch()
        .fetch(FetchRequest::get("/api/x"))
        .await
        .expect("fetch should succeed");
    assert_eq!(response.body.text().await.unwrap(), r#"{"a":1}"#);

    let payloads = network_payloads(&recorder.buffer().dump());
    assert_eq!(payloads.len(), 2);
    match &payloads[0] {
        NetworkPayload::Start { method, url, api, .. } => {
            assert_eq!(method, "GET");
            assert_eq!(url, "/api/x");
            assert_eq!(*api, NetworkApi::Fetch);
        }
        other => panic!("expected start, got {other:?}"),
    }
    match &payloads[1] {
        NetworkPayload::End {
            status,
            response_type,
            response_body,
            ..
        } => {
            assert_eq!(*status, 200);
            assert_eq!(*response_type, ResponseType::Json);
            assert_eq!(response_body, r#"{"a":1}"#);
        }
        other => panic!("expected end, got {other:?}"),
    }
}

#[tokio::test]
async fn mixed_traffic_upholds_the_pairing_invariant() {
    let (page, recorder) = recorder_at("https://example.com/");
    page.fetch.respond_json("/api/a", 200, r#"{"a":1}"#);
    page.fetch.respond_text("/api/b", 200, "hello");
    page.fetch.fail("/api/down", "connection refused");
    page.xhr.script(
        "/api/c",
        vec![
            XhrSignal::Load(XhrResponse::new(
                201,
                "Created",
                vec![("content-type".into(), "application/json".into())],
                XhrResponseValue::Text("{}".into()),
            )),
            XhrSignal::LoadEnd,
        ],
    );

    let fetch = recorder.fetch();
    let (a, b) = tokio::join!(
        fetch.fetch(FetchRequest::get("/api/a")),
        fetch.fetch(FetchRequest::get("/api/b")),
    );
    a.unwrap();
    b.unwrap();
    fetch.fetch(FetchRequest::get("/api/down")).await.unwrap_err();

    let mut xhr = recorder.new_xhr();
    xhr.open("POST", "/api/c");
    xhr.send(Some(BodyPayload::text("body"))).await.unwrap();

    let payloads = network_payloads(&recorder.buffer().dump());
    assert_eq!(payloads.len(), 8);

    // Exactly one start per id, preceding exactly one terminal event, and
    // no id reappearing after its terminal phase.
    let mut seen_start: HashMap<String, usize> = HashMap::new();
    let mut seen_terminal: HashMap<String, usize> = HashMap::new();
    for payload in &payloads {
        let id = payload.id().to_string();
        if payload.is_terminal() {
            assert!(
                seen_start.contains_key(&id),
                "terminal before start for {id}"
            );
            assert!(
                seen_terminal.insert(id.clone(), 1).is_none(),
                "second terminal for {id}"
            );
        } else {
            assert!(
                !seen_terminal.contains_key(&id),
                "start after terminal for {id}"
            );
            assert!(
                seen_start.insert(id.clone(), 1).is_none(),
                "duplicate start for {id}"
            );
        }
    }
    assert_eq!(seen_start.len(), 4);
    assert_eq!(seen_terminal.len(), 4);
}

#[tokio::test]
async fn push_state_yields_exactly_one_nav_event() {
    let (_page, recorder) = recorder_at("https://example.com/");

    recorder.history().push_state("/page2");

    let dump = recorder.buffer().dump();
    let navs: Vec<_> = dump
        .iter()
        .filter_map(SessionEvent::as_custom)
        .filter_map(|custom| match &custom.data {
            CustomData::Nav(nav) => Some(nav.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(navs.len(), 1);
    assert!(navs[0].href.ends_with("/page2"));
}

#[tokio::test]
async fn uncaught_error_yields_a_console_event() {
    let (page, recorder) = recorder_at("https://example.com/app");

    page.signals
        .send(PageSignal::Error {
            message: "x is not defined".into(),
            stack: Some("ReferenceError: x is not defined".into()),
            source: Some("app.js".into()),
            line: Some(10),
            column: Some(4),
        })
        .unwrap();
    wait_for_events(recorder.buffer(), 1).await;

    let dump = recorder.buffer().dump();
    match &dump[0].as_custom().unwrap().data {
        CustomData::Console(console) => {
            assert!(console.message.starts_with("Uncaught Error:"));
            assert_eq!(console.url, "https://example.com/app");
        }
        other => panic!("expected console event, got {other:?}"),
    }
}

#[tokio::test]
async fn pagehide_closure_sends_window_closing_once() {
    let (page, recorder) = recorder_at("https://example.com/");

    page.signals
        .send(PageSignal::PageHide { persisted: true })
        .unwrap();
    page.signals
        .send(PageSignal::PageHide { persisted: false })
        .unwrap();
    drop(page.signals);
    // The observer task finishes once the stream closes.
    while !recorder.lifecycle_task().is_finished() {
        tokio::task::yield_now().await;
    }

    let messages = page.opener.messages();
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        OpenerMessage::WindowClosing { url, .. } => {
            assert_eq!(url, "https://example.com/");
        }
        other => panic!("expected window_closing, got {other:?}"),
    }
}

#[tokio::test]
async fn download_artifact_parses_to_the_dump() {
    let (page, recorder) = recorder_at("https://example.com/");
    page.fetch.respond_text("/api/t", 200, "plain");
    recorder
        .fetch()
        .fetch(FetchRequest::get("/api/t"))
        .await
        .unwrap();
    page.dom
        .emit(serde_json::json!({"type": 3, "data": {}, "timestamp": 5u64}));

    let control = recorder.control();
    let handle = control.download().unwrap();

    let bytes = page.objects.object_bytes(&handle).unwrap();
    let parsed: Vec<SessionEvent> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed, control.dump());

    let downloads = page.objects.downloads();
    assert_eq!(downloads.len(), 1);
    assert!(downloads[0].1.starts_with("rrweb-session-"));
}

#[tokio::test]
async fn network_query_is_an_ordered_subset_of_dump() {
    let (page, recorder) = recorder_at("https://example.com/");
    page.fetch.respond_json("/api/1", 200, "{}");
    page.fetch.respond_json("/api/2", 200, "{}");

    recorder.history().push_state("/before");
    recorder
        .fetch()
        .fetch(FetchRequest::get("/api/1"))
        .await
        .unwrap();
    recorder.history().push_state("/middle");
    recorder
        .fetch()
        .fetch(FetchRequest::get("/api/2"))
        .await
        .unwrap();

    let dump = recorder.control().dump();
    let network = recorder.control().network_events();

    assert_eq!(network.len(), 4);
    assert!(network.iter().all(SessionEvent::is_network));

    // Original relative order: the filtered list appears in the same order
    // within the dump.
    let mut cursor = 0;
    for event in &network {
        let position = dump[cursor..]
            .iter()
            .position(|candidate| candidate == event)
            .expect("network event present in dump");
        cursor += position + 1;
    }
}

#[tokio::test]
async fn dom_events_interleave_untouched() {
    let (page, recorder) = recorder_at("https://example.com/");
    page.fetch.respond_json("/api/x", 200, "{}");

    page.dom
        .emit(serde_json::json!({"type": 2, "data": {"full": true}, "timestamp": 1u64}));
    recorder
        .fetch()
        .fetch(FetchRequest::get("/api/x"))
        .await
        .unwrap();
    page.dom
        .emit(serde_json::json!({"type": 3, "data": {"mut": 1}, "timestamp": 2u64}));

    let dump = recorder.buffer().dump();
    assert_eq!(dump.len(), 4);
    assert!(matches!(dump[0], SessionEvent::Dom(_)));
    assert!(matches!(dump[3], SessionEvent::Dom(_)));
    assert_eq!(
        serde_json::to_value(&dump[0]).unwrap()["data"]["full"],
        true
    );
}
