//! Bounded serialization of request and response bodies.
//!
//! Bodies arrive pre-classified as a closed [`BodyPayload`] enum instead of
//! being duck-typed at runtime; the branch outcomes match the original
//! recorder exactly. [`serialize_body`] is total: it never panics and the
//! result never exceeds `max_size` characters.

use std::collections::BTreeMap;

/// Default truncation limit, in characters.
pub const DEFAULT_MAX_SERIALIZED: usize = 4096;

/// Marker recorded for file-like form entries.
pub const FILE_MARKER: &str = "[File]";

/// A network body in one of the shapes the recorder understands.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyPayload {
    /// No body.
    Empty,
    /// Plain text; recorded as-is up to the limit.
    Text(String),
    /// Form-encoded entries, in submission order.
    Form(Vec<(String, FormValue)>),
    /// A binary buffer; only its length is recorded, never its bytes.
    Binary { byte_len: usize },
    /// Any other structured value; JSON-encoded then truncated.
    Json(serde_json::Value),
}

impl BodyPayload {
    pub fn text(value: impl Into<String>) -> Self {
        BodyPayload::Text(value.into())
    }

    pub fn json(value: serde_json::Value) -> Self {
        BodyPayload::Json(value)
    }
}

/// One form entry value: text, or a file-like attachment.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File,
}

/// Renders a body as a bounded string for the session log.
///
/// Truncation happens after structural encoding, so the primary JSON path
/// may be cut mid-document at the limit; only the fallback path degrades to
/// a plain string coercion. Replay tooling treats the field as opaque text,
/// so this mirrors the original behavior rather than re-encoding.
pub fn serialize_body(body: &BodyPayload, max_size: usize) -> String {
    match body {
        BodyPayload::Empty => String::new(),
        BodyPayload::Text(text) => truncate_chars(text, max_size),
        BodyPayload::Binary { byte_len } => {
            truncate_chars(&format!("[Binary data: {byte_len} bytes]"), max_size)
        }
        BodyPayload::Form(entries) => {
            let map: BTreeMap<&str, &str> = entries
                .iter()
                .map(|(key, value)| {
                    let rendered = match value {
                        FormValue::Text(text) => text.as_str(),
                        FormValue::File => FILE_MARKER,
                    };
                    (key.as_str(), rendered)
                })
                .collect();
            match serde_json::to_string(&map) {
                Ok(encoded) => truncate_chars(&encoded, max_size),
                Err(_) => truncate_chars(&format!("{map:?}"), max_size),
            }
        }
        BodyPayload::Json(value) => match serde_json::to_string(value) {
            Ok(encoded) => truncate_chars(&encoded, max_size),
            Err(_) => truncate_chars(&value.to_string(), max_size),
        },
    }
}

/// Convenience wrapper using [`DEFAULT_MAX_SERIALIZED`].
pub fn serialize_body_default(body: &BodyPayload) -> String {
    serialize_body(body, DEFAULT_MAX_SERIALIZED)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.len() <= max {
        // Byte length bounds char count; skip the scan.
        return text.to_string();
    }
    text.chars().take(max).collect()
}
