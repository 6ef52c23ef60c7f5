//! Recorder initialization and wiring.
//!
//! One [`Recorder`] exists per page load. `init` captures the page's
//! original capabilities, starts the DOM engine, installs the decorators,
//! and spawns the lifecycle observer. There is no re-initialization: the
//! session lives until the page terminates.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::control::RecorderControl;
use crate::error::RecorderError;
use crate::lifecycle::{LifecycleObserver, RecordingHistory};
use crate::net::fetch::RecordingFetch;
use crate::net::xhr::{RecordingXhr, XhrBackend};
use crate::page::{DomEmitFn, PageEnvironment};
use crate::session::SessionBuffer;
use crate::testmode::{is_active, persist_activation, TestModeController};

pub struct Recorder {
    buffer: SessionBuffer,
    control: Arc<RecorderControl>,
    fetch: Arc<RecordingFetch>,
    xhr_backend: Arc<dyn XhrBackend>,
    history: Arc<RecordingHistory>,
    test_mode: Option<Arc<TestModeController>>,
    lifecycle: JoinHandle<()>,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder").finish_non_exhaustive()
    }
}

impl Recorder {
    /// Builds the recorder over the captured page capabilities.
    ///
    /// Hard precondition: the DOM engine must be loaded. Without it no
    /// recording is installed at all — there is no degraded mode.
    pub fn init(environment: PageEnvironment) -> Result<Self, RecorderError> {
        let PageEnvironment {
            dom_engine,
            fetch,
            xhr,
            history,
            opener,
            storage,
            hud,
            objects,
            location,
            signals,
        } = environment;

        let Some(engine) = dom_engine else {
            tracing::error!("dom recording engine is not loaded; include it before the recorder");
            return Err(RecorderError::DomEngineMissing);
        };

        let buffer = SessionBuffer::new();

        let emit: DomEmitFn = {
            let buffer = buffer.clone();
            Box::new(move |event| buffer.record_dom(event))
        };
        let stop_handle = engine.start(emit)?;

        let fetch = Arc::new(RecordingFetch::new(fetch, buffer.clone()));
        let history = Arc::new(RecordingHistory::new(history, buffer.clone()));
        let control = Arc::new(RecorderControl::new(buffer.clone(), stop_handle, objects));

        persist_activation(&location, storage.as_ref());
        let test_mode = if is_active(storage.as_ref()) {
            let controller = Arc::new(TestModeController::new(
                control.clone(),
                buffer.clone(),
                hud,
                opener.clone(),
            ));
            let activating = controller.clone();
            tokio::spawn(async move { activating.activate().await });
            Some(controller)
        } else {
            None
        };

        let lifecycle =
            LifecycleObserver::new(buffer.clone(), history.clone(), opener).spawn(signals);

        Ok(Self {
            buffer,
            control,
            fetch,
            xhr_backend: xhr,
            history,
            test_mode,
            lifecycle,
        })
    }

    /// The decorated fetch entry point the page should use.
    pub fn fetch(&self) -> Arc<RecordingFetch> {
        self.fetch.clone()
    }

    /// Mints a recording request object, standing in for the native
    /// constructor.
    pub fn new_xhr(&self) -> RecordingXhr {
        RecordingXhr::new(self.xhr_backend.clone(), self.buffer.clone())
    }

    /// The decorated history mutators the page should use.
    pub fn history(&self) -> Arc<RecordingHistory> {
        self.history.clone()
    }

    /// The control surface (`stop`/`dump`/`download`/query).
    pub fn control(&self) -> Arc<RecorderControl> {
        self.control.clone()
    }

    /// The test-mode controller, present only when the session is flagged.
    pub fn test_mode(&self) -> Option<Arc<TestModeController>> {
        self.test_mode.clone()
    }

    pub fn buffer(&self) -> &SessionBuffer {
        &self.buffer
    }

    /// The signal-draining task; finishes when the page's signal stream
    /// closes.
    pub fn lifecycle_task(&self) -> &JoinHandle<()> {
        &self.lifecycle
    }
}
