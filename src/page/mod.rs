//! Host-page capability seams.
//!
//! The original script reached every browser capability through globals and
//! replaced them in place. Here each capability is an explicit trait; the
//! recorder captures the originals at init time and installs decorators
//! that call through to them. The host (a real browser binding or the mock
//! page) owns the implementations.

pub mod mock;

use tokio::sync::mpsc;
use url::Url;

use crate::error::{PostMessageError, RecorderError};
use crate::events::OpenerMessage;
use crate::net::fetch::FetchTransport;
use crate::net::xhr::XhrBackend;

use std::sync::Arc;

/// Callback through which the DOM engine delivers its events.
pub type DomEmitFn = Box<dyn Fn(serde_json::Value) + Send + Sync>;

/// Handle returned by [`DomEngine::start`]; consuming it stops the
/// DOM-layer recording. Other interceptors are unaffected.
pub struct DomStopHandle(Box<dyn FnOnce() + Send>);

impl DomStopHandle {
    pub fn new(stop: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(stop))
    }

    pub fn stop(self) {
        (self.0)()
    }
}

/// The external DOM snapshot/mutation engine. Opaque: the recorder calls
/// exactly one entry point and appends whatever it emits, verbatim.
pub trait DomEngine: Send + Sync {
    fn start(&self, emit: DomEmitFn) -> Result<DomStopHandle, RecorderError>;
}

/// The page's history mutators plus the current location.
pub trait HistoryApi: Send + Sync {
    fn push_state(&self, url: &str);
    fn replace_state(&self, url: &str);
    fn href(&self) -> String;
}

/// An opener window reachable via `postMessage`.
///
/// The target origin is deliberately unrestricted, matching the original's
/// `"*"`; see DESIGN.md for the known trust-boundary gap.
pub trait OpenerWindow: Send + Sync {
    fn is_closed(&self) -> bool;
    fn post_message(&self, message: &OpenerMessage) -> Result<(), PostMessageError>;
}

/// Per-session key/value storage (sessionStorage). Survives same-tab
/// navigation, not tab closure.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// The test-mode status indicator mount point. Visual rendering is the
/// host's concern; this crate only drives mount, elapsed-time text, and
/// removal.
pub trait HudSurface: Send + Sync {
    /// Attempts to attach the indicator. Returns `false` while the
    /// document body does not exist yet.
    fn mount(&self) -> bool;
    fn set_elapsed(&self, display: &str);
    fn remove(&self);
}

/// Opaque reference to a temporary downloadable object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle(String);

impl ObjectHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Browser-level object storage for download artifacts. Handles leak
/// unless explicitly revoked, hence the scoped create/download/revoke
/// lifecycle in the control API.
pub trait ObjectStore: Send + Sync {
    fn create(&self, bytes: Vec<u8>) -> ObjectHandle;
    fn download(&self, handle: &ObjectHandle, filename: &str);
    fn revoke(&self, handle: ObjectHandle);
}

/// Passive notifications from the page, delivered in event-loop order.
///
/// These model the listener set the original attached: `error`,
/// `unhandledrejection`, `popstate`, `hashchange`, `pagehide`. Listening
/// never suppresses the browser's own handling.
#[derive(Debug, Clone)]
pub enum PageSignal {
    /// An uncaught error reached the global handler.
    Error {
        message: String,
        stack: Option<String>,
        source: Option<String>,
        line: Option<u32>,
        column: Option<u32>,
    },
    /// A promise rejection was never handled.
    UnhandledRejection { reason: String },
    /// Browser-driven history navigation.
    PopState,
    /// Fragment navigation.
    HashChange,
    /// The page is being hidden; `persisted` distinguishes back/forward
    /// cache preservation from genuine closure.
    PageHide { persisted: bool },
}

/// Everything the recorder needs from the host page, captured once at
/// initialization.
pub struct PageEnvironment {
    /// The DOM engine, if loaded. Absence aborts initialization.
    pub dom_engine: Option<Arc<dyn DomEngine>>,
    pub fetch: Arc<dyn FetchTransport>,
    pub xhr: Arc<dyn XhrBackend>,
    pub history: Arc<dyn HistoryApi>,
    pub opener: Option<Arc<dyn OpenerWindow>>,
    pub storage: Arc<dyn SessionStore>,
    pub hud: Arc<dyn HudSurface>,
    pub objects: Arc<dyn ObjectStore>,
    /// The page URL at script load time (activation flags live in its query).
    pub location: Url,
    /// Stream of passive page notifications.
    pub signals: mpsc::UnboundedReceiver<PageSignal>,
}
