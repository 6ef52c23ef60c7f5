//! Session event model and wire shapes.
//!
//! Two families of events share the buffer: records emitted by the external
//! DOM engine, which pass through verbatim and are treated as opaque JSON,
//! and custom records produced by this crate. Custom records always carry
//! `"type": 5` (the rrweb custom-event type) and a `{ tag, payload }`
//! envelope, so replay tooling built for the original recordings keeps
//! working.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::util::now_ms;

/// rrweb event type reserved for custom application events.
pub const CUSTOM_EVENT_TYPE: u64 = 5;

/// One atomic record in the session log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SessionEvent {
    /// A custom event tagged by this crate (`type: 5`).
    Custom(CustomEvent),
    /// A DOM-layer event from the external engine, passed through verbatim.
    Dom(serde_json::Value),
}

impl SessionEvent {
    pub fn as_custom(&self) -> Option<&CustomEvent> {
        match self {
            SessionEvent::Custom(event) => Some(event),
            SessionEvent::Dom(_) => None,
        }
    }

    /// True for custom-tagged network events.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            SessionEvent::Custom(CustomEvent {
                data: CustomData::Network(_),
                ..
            })
        )
    }
}

/// Wire shape: `{ "type": 5, "data": { "tag": …, "payload": … }, "timestamp": … }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomEvent {
    #[serde(rename = "type")]
    pub event_type: CustomMarker,
    pub data: CustomData,
    pub timestamp: u64,
}

impl CustomEvent {
    /// Stamps the custom type marker and the current wall-clock timestamp.
    pub fn now(data: CustomData) -> Self {
        Self {
            event_type: CustomMarker,
            data,
            timestamp: now_ms(),
        }
    }
}

/// Serializes as the literal `5`; refuses anything else on input.
///
/// Keeping the discriminant strict is what lets [`SessionEvent`] stay
/// untagged without swallowing DOM events (whose `type` is 0–4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CustomMarker;

impl Serialize for CustomMarker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(CUSTOM_EVENT_TYPE)
    }
}

impl<'de> Deserialize<'de> for CustomMarker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u64::deserialize(deserializer)?;
        if value == CUSTOM_EVENT_TYPE {
            Ok(CustomMarker)
        } else {
            Err(de::Error::custom(format!(
                "expected custom event type {CUSTOM_EVENT_TYPE}, got {value}"
            )))
        }
    }
}

/// The `{ tag, payload }` envelope of a custom event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "tag", content = "payload", rename_all = "lowercase")]
pub enum CustomData {
    Console(ConsolePayload),
    Network(NetworkPayload),
    Nav(NavPayload),
}

/// Which native API issued a network request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkApi {
    Fetch,
    Xhr,
}

impl fmt::Display for NetworkApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkApi::Fetch => write!(f, "fetch"),
            NetworkApi::Xhr => write!(f, "xhr"),
        }
    }
}

/// How a response body was read for recording.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Json,
    Text,
    Binary,
}

/// Network request lifecycle, correlated by `id`.
///
/// Every `start` is followed by exactly one terminal phase (`end` or
/// `error`) for the same id; ids are never reused after their terminal
/// phase. `headers` is present on the fetch path, `responseHeaders` (the raw
/// header block string) on the xhr path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "phase", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum NetworkPayload {
    Start {
        id: String,
        api: NetworkApi,
        url: String,
        method: String,
        headers: HashMap<String, String>,
        request_body: String,
        timestamp: u64,
    },
    End {
        id: String,
        status: u16,
        status_text: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        headers: Option<HashMap<String, String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        response_headers: Option<String>,
        response_body: String,
        response_type: ResponseType,
        duration: u64,
        timestamp: u64,
    },
    Error {
        id: String,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        duration: u64,
        timestamp: u64,
    },
}

impl NetworkPayload {
    pub fn id(&self) -> &str {
        match self {
            NetworkPayload::Start { id, .. }
            | NetworkPayload::End { id, .. }
            | NetworkPayload::Error { id, .. } => id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, NetworkPayload::Start { .. })
    }
}

/// Severity of a captured console record. Only uncaught errors and
/// unhandled rejections are recorded, so `error` is the only level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsolePayload {
    pub level: ConsoleLevel,
    pub message: String,
    pub args: Vec<String>,
    pub timestamp: u64,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// One SPA navigation transition. The short `t` key is the original wire
/// name and is kept for replay compatibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NavPayload {
    pub href: String,
    pub t: u64,
}

/// Messages posted to an opener window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenerMessage {
    /// One-shot notice sent on genuine tab/window closure.
    WindowClosing { url: String, timestamp: u64 },
    /// Full session relay from the test-mode stop control; `data` is the
    /// JSON-stringified session array.
    RrwebEvents { data: String },
}
