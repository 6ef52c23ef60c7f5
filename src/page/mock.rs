//! Scripted page capabilities for deterministic testing.
//!
//! Implements every capability trait without a browser. Use these for unit
//! and integration tests that need to verify recording flows end to end.
//!
//! # Example
//! ```no_run
//! use pagetape::page::mock::MockPage;
//! use pagetape::Recorder;
//!
//! # fn demo() -> Result<(), pagetape::RecorderError> {
//! let (page, env) = MockPage::new("https://example.com/");
//! page.fetch.respond_json("/api/x", 200, r#"{"a":1}"#);
//! let recorder = Recorder::init(env)?;
//! // Drive recorder.fetch() / recorder.new_xhr() from here.
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{PostMessageError, RecorderError};
use crate::events::OpenerMessage;
use crate::net::body::ResponseBody;
use crate::net::fetch::{FetchFailure, FetchRequest, FetchResponse, FetchTransport};
use crate::net::xhr::{XhrBackend, XhrRequest, XhrSignal};
use crate::page::{
    DomEmitFn, DomEngine, DomStopHandle, HistoryApi, HudSurface, ObjectHandle, ObjectStore,
    OpenerWindow, PageEnvironment, PageSignal, SessionStore,
};

/// DOM engine whose emit callback is captured so tests can inject DOM
/// events at will.
#[derive(Default)]
pub struct MockDomEngine {
    emit: Mutex<Option<DomEmitFn>>,
    stopped: Arc<AtomicBool>,
    fail_on_start: AtomicBool,
}

impl MockDomEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `start` call fail, for precondition tests.
    pub fn fail_on_start(&self) {
        self.fail_on_start.store(true, Ordering::SeqCst);
    }

    /// Pushes one DOM-layer event through the captured callback.
    pub fn emit(&self, event: serde_json::Value) {
        if let Some(emit) = self.emit.lock().as_ref() {
            emit(event);
        }
    }

    pub fn started(&self) -> bool {
        self.emit.lock().is_some()
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl DomEngine for MockDomEngine {
    fn start(&self, emit: DomEmitFn) -> Result<DomStopHandle, RecorderError> {
        if self.fail_on_start.load(Ordering::SeqCst) {
            return Err(RecorderError::DomEngineStart("scripted failure".into()));
        }
        *self.emit.lock() = Some(emit);
        let stopped = self.stopped.clone();
        Ok(DomStopHandle::new(move || {
            stopped.store(true, Ordering::SeqCst)
        }))
    }
}

enum ScriptedFetch {
    Respond {
        status: u16,
        status_text: String,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },
    BrokenStream {
        status: u16,
        status_text: String,
        error: String,
    },
    Fail {
        message: String,
    },
}

/// Fetch transport answering from a per-url script.
#[derive(Default)]
pub struct MockFetchTransport {
    scripts: Mutex<HashMap<String, ScriptedFetch>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MockFetchTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a JSON response with matching content-type and length.
    pub fn respond_json(&self, url: &str, status: u16, body: &str) {
        self.respond_with(
            url,
            status,
            vec![
                ("content-type".into(), "application/json".into()),
                ("content-length".into(), body.len().to_string()),
            ],
            body.as_bytes().to_vec(),
        );
    }

    pub fn respond_text(&self, url: &str, status: u16, body: &str) {
        self.respond_with(
            url,
            status,
            vec![("content-type".into(), "text/plain".into())],
            body.as_bytes().to_vec(),
        );
    }

    pub fn respond_with(
        &self,
        url: &str,
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) {
        self.scripts.lock().insert(
            url.to_string(),
            ScriptedFetch::Respond {
                status,
                status_text: status_text_for(status),
                headers,
                body,
            },
        );
    }

    /// Scripts a response whose body stream fails mid-read.
    pub fn respond_broken_stream(&self, url: &str, status: u16, error: &str) {
        self.scripts.lock().insert(
            url.to_string(),
            ScriptedFetch::BrokenStream {
                status,
                status_text: status_text_for(status),
                error: error.to_string(),
            },
        );
    }

    /// Scripts a network-level failure.
    pub fn fail(&self, url: &str, message: &str) {
        self.scripts.lock().insert(
            url.to_string(),
            ScriptedFetch::Fail {
                message: message.to_string(),
            },
        );
    }

    /// Every request seen, in call order.
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl FetchTransport for MockFetchTransport {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchFailure> {
        self.requests.lock().push(request.clone());
        let scripts = self.scripts.lock();
        match scripts.get(&request.url) {
            Some(ScriptedFetch::Respond {
                status,
                status_text,
                headers,
                body,
            }) => Ok(FetchResponse::new(
                *status,
                status_text.clone(),
                headers.clone(),
                ResponseBody::from_bytes(body.clone()),
            )),
            Some(ScriptedFetch::BrokenStream {
                status,
                status_text,
                error,
            }) => {
                let (tx, body) = ResponseBody::channel();
                tx.fail(error.clone());
                Ok(FetchResponse::new(
                    *status,
                    status_text.clone(),
                    Vec::new(),
                    body,
                ))
            }
            Some(ScriptedFetch::Fail { message }) => Err(FetchFailure::new(message.clone())),
            None => Err(FetchFailure::new(format!(
                "no scripted response for {}",
                request.url
            ))),
        }
    }
}

/// XHR backend replaying a scripted lifecycle signal sequence per url.
#[derive(Default)]
pub struct MockXhrBackend {
    scripts: Mutex<HashMap<String, Vec<XhrSignal>>>,
    requests: Mutex<Vec<XhrRequest>>,
}

impl MockXhrBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: &str, signals: Vec<XhrSignal>) {
        self.scripts.lock().insert(url.to_string(), signals);
    }

    pub fn requests(&self) -> Vec<XhrRequest> {
        self.requests.lock().clone()
    }
}

impl XhrBackend for MockXhrBackend {
    fn execute(&self, request: XhrRequest) -> mpsc::UnboundedReceiver<XhrSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        let signals = self
            .scripts
            .lock()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| vec![XhrSignal::Error, XhrSignal::LoadEnd]);
        self.requests.lock().push(request);
        for signal in signals {
            let _ = tx.send(signal);
        }
        rx
    }
}

/// History keeping a real resolved location.
pub struct MockHistory {
    current: Mutex<Url>,
}

impl MockHistory {
    pub fn new(href: &str) -> Self {
        Self {
            current: Mutex::new(Url::parse(href).expect("valid mock url")),
        }
    }
}

impl HistoryApi for MockHistory {
    fn push_state(&self, url: &str) {
        let mut current = self.current.lock();
        if let Ok(next) = current.join(url) {
            *current = next;
        }
    }

    fn replace_state(&self, url: &str) {
        self.push_state(url);
    }

    fn href(&self) -> String {
        self.current.lock().to_string()
    }
}

/// Opener capturing posted messages; can be closed or made to fail.
#[derive(Default)]
pub struct MockOpener {
    closed: AtomicBool,
    fail_next: AtomicBool,
    messages: Mutex<Vec<OpenerMessage>>,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_post(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<OpenerMessage> {
        self.messages.lock().clone()
    }
}

impl OpenerWindow for MockOpener {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn post_message(&self, message: &OpenerMessage) -> Result<(), PostMessageError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PostMessageError("scripted postMessage failure".into()));
        }
        if self.is_closed() {
            return Err(PostMessageError("opener window is closed".into()));
        }
        self.messages.lock().push(message.clone());
        Ok(())
    }
}

/// In-memory sessionStorage.
#[derive(Default)]
pub struct MockSessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MockSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MockSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .insert(key.to_string(), value.to_string());
    }
}

/// Status indicator with a scriptable "body exists" threshold.
#[derive(Default)]
pub struct MockHud {
    attempts: AtomicU32,
    ready_after: AtomicU32,
    never_ready: AtomicBool,
    mounted: AtomicBool,
    removed: AtomicBool,
    elapsed: Mutex<Vec<String>>,
}

impl MockHud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount succeeds once `attempts` mounts have already failed.
    pub fn set_body_ready_after(&self, attempts: u32) {
        self.ready_after.store(attempts, Ordering::SeqCst);
    }

    pub fn never_ready(&self) {
        self.never_ready.store(true, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    pub fn mount_attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn elapsed_values(&self) -> Vec<String> {
        self.elapsed.lock().clone()
    }
}

impl HudSurface for MockHud {
    fn mount(&self) -> bool {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.never_ready.load(Ordering::SeqCst) {
            return false;
        }
        if attempt > self.ready_after.load(Ordering::SeqCst) {
            self.mounted.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    fn set_elapsed(&self, display: &str) {
        self.elapsed.lock().push(display.to_string());
    }

    fn remove(&self) {
        self.removed.store(true, Ordering::SeqCst);
    }
}

/// Object storage tracking creates, downloads and revocations.
#[derive(Default)]
pub struct MockObjectStore {
    next_id: AtomicU64,
    objects: Mutex<HashMap<ObjectHandle, Vec<u8>>>,
    downloads: Mutex<Vec<(ObjectHandle, String)>>,
    revoked: Mutex<Vec<ObjectHandle>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_bytes(&self, handle: &ObjectHandle) -> Option<Vec<u8>> {
        self.objects.lock().get(handle).cloned()
    }

    pub fn downloads(&self) -> Vec<(ObjectHandle, String)> {
        self.downloads.lock().clone()
    }

    pub fn revoked(&self) -> Vec<ObjectHandle> {
        self.revoked.lock().clone()
    }
}

impl ObjectStore for MockObjectStore {
    fn create(&self, bytes: Vec<u8>) -> ObjectHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = ObjectHandle::new(format!("blob:mock/{id}"));
        self.objects.lock().insert(handle.clone(), bytes);
        handle
    }

    fn download(&self, handle: &ObjectHandle, filename: &str) {
        self.downloads
            .lock()
            .push((handle.clone(), filename.to_string()));
    }

    fn revoke(&self, handle: ObjectHandle) {
        self.objects.lock().remove(&handle);
        self.revoked.lock().push(handle);
    }
}

/// A fully-assembled mock page: every capability plus the signal sender.
pub struct MockPage {
    pub dom: Arc<MockDomEngine>,
    pub fetch: Arc<MockFetchTransport>,
    pub xhr: Arc<MockXhrBackend>,
    pub history: Arc<MockHistory>,
    pub opener: Arc<MockOpener>,
    pub storage: Arc<MockSessionStore>,
    pub hud: Arc<MockHud>,
    pub objects: Arc<MockObjectStore>,
    pub signals: mpsc::UnboundedSender<PageSignal>,
}

impl MockPage {
    /// Builds a page at `url` with an open opener window and a loaded DOM
    /// engine. Tweak the returned environment (e.g. drop `dom_engine`) for
    /// precondition tests.
    pub fn new(url: &str) -> (MockPage, PageEnvironment) {
        let dom = Arc::new(MockDomEngine::new());
        let fetch = Arc::new(MockFetchTransport::new());
        let xhr = Arc::new(MockXhrBackend::new());
        let history = Arc::new(MockHistory::new(url));
        let opener = Arc::new(MockOpener::new());
        let storage = Arc::new(MockSessionStore::new());
        let hud = Arc::new(MockHud::new());
        let objects = Arc::new(MockObjectStore::new());
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let environment = PageEnvironment {
            dom_engine: Some(dom.clone()),
            fetch: fetch.clone(),
            xhr: xhr.clone(),
            history: history.clone(),
            opener: Some(opener.clone()),
            storage: storage.clone(),
            hud: hud.clone(),
            objects: objects.clone(),
            location: Url::parse(url).expect("valid mock url"),
            signals: signal_rx,
        };

        let page = MockPage {
            dom,
            fetch,
            xhr,
            history,
            opener,
            storage,
            hud,
            objects,
            signals: signal_tx,
        };

        (page, environment)
    }
}

fn status_text_for(status: u16) -> String {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        304 => "Not Modified",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    }
    .to_string()
}
