//! Recorder-level error types.
//!
//! Network pass-through failures (`FetchFailure`, `XhrError`) live next to
//! their transports in [`crate::net`]; this module holds the errors owned by
//! the recorder itself.

/// Errors raised while initializing or exporting a recording session.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// The DOM snapshot engine was absent when the recorder initialized.
    ///
    /// This is a hard precondition: there is no degraded mode without the
    /// engine, matching the original script's refusal to install anything
    /// when `window.rrweb` is missing.
    #[error("dom recording engine is not loaded; include it before the recorder")]
    DomEngineMissing,

    /// The DOM engine refused to start recording.
    #[error("dom recording engine failed to start: {0}")]
    DomEngineStart(String),

    /// Session export could not be serialized.
    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A cross-window `postMessage` that could not be delivered.
///
/// Always non-fatal: callers log and ignore it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("postMessage failed: {0}")]
pub struct PostMessageError(pub String);
