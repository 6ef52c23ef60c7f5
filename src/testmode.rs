//! Test-mode activation and the recording-status controller.
//!
//! Test mode is opt-in via the page URL (`?testmode=1` or `?debug=1`) and
//! persisted in per-session storage so it survives same-tab navigation.
//! While active, a status indicator shows elapsed recording time, and its
//! stop control is the only path that relays the full session to an opener
//! window.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Instant};
use url::Url;

use crate::control::RecorderControl;
use crate::events::OpenerMessage;
use crate::page::{HudSurface, OpenerWindow, SessionStore};
use crate::session::SessionBuffer;

/// Session-storage key persisting the activation flag.
pub const TEST_MODE_KEY: &str = "rrweb_testmode";

/// Fixed backoff between HUD mount attempts while the document body does
/// not exist yet.
pub const HUD_MOUNT_BACKOFF: Duration = Duration::from_millis(100);

/// Mount attempts before giving up on the HUD. Recording itself is never
/// affected by a missing HUD.
pub const HUD_MOUNT_MAX_ATTEMPTS: u32 = 100;

/// Reads the activation flags from the page URL and persists them. Runs
/// once at recorder initialization, before the active check.
pub fn persist_activation(location: &Url, storage: &dyn SessionStore) {
    let flagged = location
        .query_pairs()
        .any(|(key, value)| (key == "testmode" || key == "debug") && value == "1");
    if flagged {
        storage.set(TEST_MODE_KEY, "true");
    }
}

/// True when the persisted flag marks this session as test mode.
pub fn is_active(storage: &dyn SessionStore) -> bool {
    storage.get(TEST_MODE_KEY).as_deref() == Some("true")
}

/// Drives the status indicator and the stop control while test mode is
/// active.
pub struct TestModeController {
    control: Arc<RecorderControl>,
    buffer: SessionBuffer,
    hud: Arc<dyn HudSurface>,
    opener: Option<Arc<dyn OpenerWindow>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl TestModeController {
    pub fn new(
        control: Arc<RecorderControl>,
        buffer: SessionBuffer,
        hud: Arc<dyn HudSurface>,
        opener: Option<Arc<dyn OpenerWindow>>,
    ) -> Self {
        Self {
            control,
            buffer,
            hud,
            opener,
            ticker: Mutex::new(None),
        }
    }

    /// Mounts the HUD, retrying with a fixed backoff until the document
    /// body exists, then starts the once-per-second elapsed ticker.
    pub async fn activate(&self) {
        let mut mounted = false;
        for _ in 0..HUD_MOUNT_MAX_ATTEMPTS {
            if self.hud.mount() {
                mounted = true;
                break;
            }
            sleep(HUD_MOUNT_BACKOFF).await;
        }
        if !mounted {
            tracing::warn!("document body never appeared; skipping status indicator");
            return;
        }

        let hud = self.hud.clone();
        let started = Instant::now();
        let handle = tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(1));
            loop {
                tick.tick().await;
                hud.set_elapsed(&format_elapsed(started.elapsed().as_secs()));
            }
        });
        *self.ticker.lock() = Some(handle);
    }

    /// The stop control: cancels the ticker, stops the DOM recorder,
    /// relays the full session to the opener, and removes the indicator.
    pub fn stop(&self) {
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.abort();
        }

        self.control.stop();

        if let Some(opener) = &self.opener {
            match self.buffer.to_json() {
                Ok(data) => {
                    let message = OpenerMessage::RrwebEvents { data };
                    if let Err(err) = opener.post_message(&message) {
                        tracing::debug!(error = %err, "failed to relay session to opener");
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "failed to serialize session for relay");
                }
            }
        }

        self.hud.remove();
    }
}

/// Zero-padded `MM:SS` for the HUD.
fn format_elapsed(elapsed_secs: u64) -> String {
    format!("{:02}:{:02}", elapsed_secs / 60, elapsed_secs % 60)
}
