//! The control surface exposed to the host page.
//!
//! Equivalent of the original's `window.__rr` object: stop, dump, download
//! and the network-event query. `stop` only halts the DOM layer — the
//! network and lifecycle interceptors keep appending until the page
//! actually terminates.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::RecorderError;
use crate::events::SessionEvent;
use crate::page::{DomStopHandle, ObjectHandle, ObjectStore};
use crate::session::SessionBuffer;
use crate::util::now_ms;

/// How long a download artifact handle stays alive before being revoked.
pub const ARTIFACT_REVOKE_DELAY: Duration = Duration::from_secs(1);

pub struct RecorderControl {
    buffer: SessionBuffer,
    stop_handle: Mutex<Option<DomStopHandle>>,
    objects: Arc<dyn ObjectStore>,
}

impl RecorderControl {
    pub fn new(
        buffer: SessionBuffer,
        stop_handle: DomStopHandle,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            buffer,
            stop_handle: Mutex::new(Some(stop_handle)),
            objects,
        }
    }

    /// Halts the DOM-layer recorder. The original left a second call
    /// undefined; here the handle is taken on first use and a repeat call
    /// is a logged no-op.
    pub fn stop(&self) {
        match self.stop_handle.lock().take() {
            Some(handle) => handle.stop(),
            None => tracing::warn!("stop() called but dom recording is already stopped"),
        }
    }

    /// Independent copy of the current session. The live buffer cannot be
    /// reached through the returned value.
    pub fn dump(&self) -> Vec<SessionEvent> {
        self.buffer.dump()
    }

    /// Exports the session as a pretty-printed JSON artifact named
    /// `rrweb-session-<epoch-ms>.json`. The object handle is revoked after
    /// [`ARTIFACT_REVOKE_DELAY`] so browser-level object storage does not
    /// leak.
    pub fn download(&self) -> Result<ObjectHandle, RecorderError> {
        let bytes = self.buffer.to_json_pretty()?;
        let handle = self.objects.create(bytes);
        let filename = format!("rrweb-session-{}.json", now_ms());
        self.objects.download(&handle, &filename);

        let objects = self.objects.clone();
        let to_revoke = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ARTIFACT_REVOKE_DELAY).await;
            objects.revoke(to_revoke);
        });

        Ok(handle)
    }

    /// Custom-tagged network events only, in original relative order.
    pub fn network_events(&self) -> Vec<SessionEvent> {
        self.buffer.network_events()
    }
}
