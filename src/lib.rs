pub mod control;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod net;
pub mod page;
pub mod recorder;
pub mod serialize;
pub mod session;
pub mod testmode;
pub mod util;

pub use control::{RecorderControl, ARTIFACT_REVOKE_DELAY};
pub use error::{PostMessageError, RecorderError};
pub use events::{
    ConsoleLevel, ConsolePayload, CustomData, CustomEvent, NavPayload, NetworkApi, NetworkPayload,
    OpenerMessage, ResponseType, SessionEvent, CUSTOM_EVENT_TYPE,
};
pub use lifecycle::{LifecycleObserver, RecordingHistory};
pub use net::{
    FetchFailure, FetchRequest, FetchResponse, FetchTransport, RecordingFetch, RecordingXhr,
    XhrError, XhrResponse, XhrSignal,
};
pub use page::{PageEnvironment, PageSignal};
pub use recorder::Recorder;
pub use serialize::{serialize_body, BodyPayload, FormValue, DEFAULT_MAX_SERIALIZED};
pub use session::SessionBuffer;
pub use testmode::{TestModeController, TEST_MODE_KEY};
