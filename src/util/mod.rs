//! Small shared helpers: wall-clock timestamps and request id generation.

use uuid::Uuid;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Random correlation id for one network request.
///
/// Collisions within a single session are negligible; the id never leaves
/// the session payload, so no global uniqueness is required.
pub fn request_id() -> String {
    Uuid::new_v4().simple().to_string()
}
