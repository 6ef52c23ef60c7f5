//! The event-driven network path and its recording proxy.
//!
//! One [`RecordingXhr`] stands in for one request object: `open` captures
//! the method and url, `set_request_header` accumulates the header map, and
//! `send` emits the `start` event before driving the backend and observing
//! its lifecycle signals. The signal stream models the listener set the
//! original attached (`load`, `loadend`, `error`, `abort`, `timeout`).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::events::{CustomData, NetworkApi, NetworkPayload, ResponseType};
use crate::serialize::{serialize_body_default, BodyPayload};
use crate::session::SessionBuffer;
use crate::util::{now_ms, request_id};

/// The `responseType` property of a request object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum XhrResponseType {
    #[default]
    Text,
    Json,
    Blob,
    ArrayBuffer,
}

/// A fully-assembled request handed to the backend by `send`.
#[derive(Debug, Clone)]
pub struct XhrRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<BodyPayload>,
    pub response_type: XhrResponseType,
}

/// The settled response state of a request object.
#[derive(Debug, Clone)]
pub struct XhrResponse {
    pub status: u16,
    pub status_text: String,
    headers: Vec<(String, String)>,
    pub body: XhrResponseValue,
}

#[derive(Debug, Clone)]
pub enum XhrResponseValue {
    Text(String),
    Binary { byte_len: usize },
}

impl XhrResponse {
    pub fn new(
        status: u16,
        status_text: impl Into<String>,
        headers: Vec<(String, String)>,
        body: XhrResponseValue,
    ) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers,
            body,
        }
    }

    /// Case-insensitive single-header lookup (`getResponseHeader`).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The raw header block (`getAllResponseHeaders`): lowercased names,
    /// CRLF-terminated lines.
    pub fn all_headers(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.headers {
            out.push_str(&key.to_ascii_lowercase());
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out
    }
}

/// Lifecycle notifications for one in-flight request, in firing order.
#[derive(Debug, Clone)]
pub enum XhrSignal {
    /// The request completed with a response.
    Load(XhrResponse),
    /// Fired after `load`, and after failures too. Carries no state.
    LoadEnd,
    Error,
    Abort,
    Timeout,
}

/// How a failed request surfaces to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum XhrError {
    #[error("network error")]
    Network,
    #[error("request aborted")]
    Aborted,
    #[error("request timed out")]
    TimedOut,
}

/// The captured request-object constructor. `execute` issues the request
/// and delivers lifecycle signals until the channel closes.
pub trait XhrBackend: Send + Sync {
    fn execute(&self, request: XhrRequest) -> mpsc::UnboundedReceiver<XhrSignal>;
}

/// Proxy for one request object, produced by the recorder in place of the
/// native constructor.
pub struct RecordingXhr {
    backend: Arc<dyn XhrBackend>,
    buffer: SessionBuffer,
    id: String,
    method: String,
    url: String,
    request_headers: HashMap<String, String>,
    pub response_type: XhrResponseType,
}

impl RecordingXhr {
    pub fn new(backend: Arc<dyn XhrBackend>, buffer: SessionBuffer) -> Self {
        Self {
            backend,
            buffer,
            id: request_id(),
            method: "GET".to_string(),
            url: String::new(),
            request_headers: HashMap::new(),
            response_type: XhrResponseType::default(),
        }
    }

    pub fn open(&mut self, method: &str, url: &str) {
        self.method = method.to_string();
        self.url = url.to_string();
    }

    pub fn set_request_header(&mut self, name: &str, value: &str) {
        self.request_headers
            .insert(name.to_string(), value.to_string());
    }

    /// Issues the request, recording `start` and exactly one terminal
    /// event. The backend's outcome is returned unchanged.
    ///
    /// The original wired both `load` and `loadend` to the same handler and
    /// could emit the terminal event twice on success; that duplication is
    /// collapsed here, so later terminal signals for a settled request are
    /// ignored.
    pub async fn send(&mut self, body: Option<BodyPayload>) -> Result<XhrResponse, XhrError> {
        let started = now_ms();
        let request_body = body
            .as_ref()
            .map(serialize_body_default)
            .unwrap_or_default();

        self.buffer
            .record_custom(CustomData::Network(NetworkPayload::Start {
                id: self.id.clone(),
                api: NetworkApi::Xhr,
                url: self.url.clone(),
                method: self.method.clone(),
                headers: self.request_headers.clone(),
                request_body,
                timestamp: started,
            }));

        let request = XhrRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.request_headers.clone(),
            body,
            response_type: self.response_type,
        };

        let mut signals = self.backend.execute(request);
        let mut terminal_recorded = false;
        let mut outcome: Option<Result<XhrResponse, XhrError>> = None;

        while let Some(signal) = signals.recv().await {
            match signal {
                XhrSignal::Load(response) => {
                    if !terminal_recorded {
                        self.record_end(&response, started);
                        terminal_recorded = true;
                    }
                    outcome = Some(Ok(response));
                }
                XhrSignal::LoadEnd => {
                    // Duplicate of whichever terminal signal preceded it.
                }
                XhrSignal::Error | XhrSignal::Abort | XhrSignal::Timeout => {
                    if !terminal_recorded {
                        self.record_error(started);
                        terminal_recorded = true;
                    }
                    if outcome.is_none() {
                        let error = match signal {
                            XhrSignal::Abort => XhrError::Aborted,
                            XhrSignal::Timeout => XhrError::TimedOut,
                            _ => XhrError::Network,
                        };
                        outcome = Some(Err(error));
                    }
                }
            }
        }

        // A backend that drops the channel without a terminal signal models
        // page teardown mid-flight: the session keeps the dangling `start`
        // with no synthetic terminal event.
        outcome.unwrap_or(Err(XhrError::Network))
    }

    fn record_end(&self, response: &XhrResponse, started: u64) {
        let (body_text, response_type) = classify_response(self.response_type, response);
        self.buffer
            .record_custom(CustomData::Network(NetworkPayload::End {
                id: self.id.clone(),
                status: response.status,
                status_text: response.status_text.clone(),
                ok: (200..400).contains(&response.status),
                headers: None,
                response_headers: Some(response.all_headers()),
                response_body: serialize_body_default(&BodyPayload::Text(body_text)),
                response_type,
                duration: now_ms().saturating_sub(started),
                timestamp: now_ms(),
            }));
    }

    fn record_error(&self, started: u64) {
        self.buffer
            .record_custom(CustomData::Network(NetworkPayload::Error {
                id: self.id.clone(),
                error: "Network error".to_string(),
                stack: None,
                duration: now_ms().saturating_sub(started),
                timestamp: now_ms(),
            }));
    }
}

/// Mirrors the fetch path's classification, driven by `responseType` first
/// and the content-type header second.
fn classify_response(
    response_type: XhrResponseType,
    response: &XhrResponse,
) -> (String, ResponseType) {
    let content_type = response
        .header("content-type")
        .unwrap_or_default()
        .to_ascii_lowercase();

    if response_type == XhrResponseType::Json || content_type.contains("application/json") {
        (text_of(&response.body), ResponseType::Json)
    } else if matches!(
        response_type,
        XhrResponseType::Blob | XhrResponseType::ArrayBuffer
    ) {
        let size = match &response.body {
            XhrResponseValue::Binary { byte_len } => byte_len.to_string(),
            XhrResponseValue::Text(_) => "unknown".to_string(),
        };
        (
            format!("[Binary response: {size} bytes]"),
            ResponseType::Binary,
        )
    } else {
        (text_of(&response.body), ResponseType::Text)
    }
}

fn text_of(body: &XhrResponseValue) -> String {
    match body {
        XhrResponseValue::Text(text) => text.clone(),
        XhrResponseValue::Binary { byte_len } => {
            format!("[Binary response: {byte_len} bytes]")
        }
    }
}
