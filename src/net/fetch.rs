//! The promise-based network path and its recording decorator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::events::{CustomData, NetworkApi, NetworkPayload, ResponseType};
use crate::net::body::ResponseBody;
use crate::serialize::{serialize_body_default, BodyPayload};
use crate::session::SessionBuffer;
use crate::util::{now_ms, request_id};

/// A network-level fetch failure (connection refused, DNS, abort). HTTP
/// error statuses are not failures; they resolve normally.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct FetchFailure {
    pub message: String,
    pub stack: Option<String>,
}

impl FetchFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }
}

/// An outbound fetch call.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<BodyPayload>,
}

impl FetchRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: BodyPayload) -> Self {
        self.body = Some(body);
        self
    }
}

/// A fetch response with a one-shot streaming body.
#[derive(Debug)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl FetchResponse {
    pub fn new(
        status: u16,
        status_text: impl Into<String>,
        headers: Vec<(String, String)>,
        body: ResponseBody,
    ) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers,
            body,
        }
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Header entries as a map with lowercased names, the shape
    /// `Object.fromEntries(headers.entries())` produces.
    pub fn headers_map(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value.clone()))
            .collect()
    }

    /// Splits off an independent copy of this response. Both this response
    /// and the returned one remain fully consumable.
    pub fn clone_response(&mut self) -> FetchResponse {
        let body = std::mem::replace(&mut self.body, ResponseBody::empty());
        let (original, copy) = body.tee();
        self.body = original;
        FetchResponse {
            status: self.status,
            status_text: self.status_text.clone(),
            headers: self.headers.clone(),
            body: copy,
        }
    }
}

/// The captured fetch entry point.
#[async_trait]
pub trait FetchTransport: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchFailure>;
}

/// Decorator installed in place of the page's fetch. Emits a `start` event
/// before delegating, then exactly one terminal event, and hands back the
/// inner transport's result untouched.
pub struct RecordingFetch {
    inner: Arc<dyn FetchTransport>,
    buffer: SessionBuffer,
}

impl RecordingFetch {
    pub fn new(inner: Arc<dyn FetchTransport>, buffer: SessionBuffer) -> Self {
        Self { inner, buffer }
    }
}

#[async_trait]
impl FetchTransport for RecordingFetch {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchFailure> {
        let started = now_ms();
        let id = request_id();

        let request_body = request
            .body
            .as_ref()
            .map(serialize_body_default)
            .unwrap_or_default();

        self.buffer
            .record_custom(CustomData::Network(NetworkPayload::Start {
                id: id.clone(),
                api: NetworkApi::Fetch,
                url: request.url.clone(),
                method: request.method.clone(),
                headers: request.headers.clone(),
                request_body,
                timestamp: started,
            }));

        match self.inner.fetch(request).await {
            Ok(mut response) => {
                let copy = response.clone_response();
                let (body_text, response_type) = read_for_record(&response, copy).await;

                self.buffer
                    .record_custom(CustomData::Network(NetworkPayload::End {
                        id,
                        status: response.status,
                        status_text: response.status_text.clone(),
                        ok: response.ok(),
                        headers: Some(response.headers_map()),
                        response_headers: None,
                        response_body: serialize_body_default(&BodyPayload::Text(body_text)),
                        response_type,
                        duration: now_ms().saturating_sub(started),
                        timestamp: now_ms(),
                    }));

                Ok(response)
            }
            Err(failure) => {
                self.buffer
                    .record_custom(CustomData::Network(NetworkPayload::Error {
                        id,
                        error: failure.message.clone(),
                        stack: failure.stack.clone(),
                        duration: now_ms().saturating_sub(started),
                        timestamp: now_ms(),
                    }));
                Err(failure)
            }
        }
    }
}

/// Reads the cloned body according to the response's content type.
///
/// Image, video and audio bodies are never read; a size marker stands in.
/// A failed read degrades to an error marker inside the `end` event, it
/// never turns the request into an `error` phase.
async fn read_for_record(response: &FetchResponse, copy: FetchResponse) -> (String, ResponseType) {
    let content_type = response
        .header("content-type")
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.contains("application/json") {
        match copy.body.text().await {
            Ok(text) => (text, ResponseType::Json),
            Err(err) => (format!("[Error reading response: {err}]"), ResponseType::Text),
        }
    } else if content_type.contains("text/") {
        match copy.body.text().await {
            Ok(text) => (text, ResponseType::Text),
            Err(err) => (format!("[Error reading response: {err}]"), ResponseType::Text),
        }
    } else if content_type.contains("image/")
        || content_type.contains("video/")
        || content_type.contains("audio/")
    {
        let length = response
            .header("content-length")
            .unwrap_or("unknown")
            .to_string();
        (
            format!("[{content_type} - {length} bytes]"),
            ResponseType::Binary,
        )
    } else {
        match copy.body.text().await {
            Ok(text) => (text, ResponseType::Text),
            Err(err) => (format!("[Error reading response: {err}]"), ResponseType::Text),
        }
    }
}
