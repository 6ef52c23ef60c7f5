//! Network interception for the two native request APIs.
//!
//! Both paths are strictly observational: arguments, results, and failures
//! pass through unchanged, and instrumentation failures never reach the
//! caller. Each request is correlated across its `start`/`end`/`error`
//! events by a random id generated at interception time.

pub mod body;
pub mod fetch;
pub mod xhr;

pub use body::{BodyError, BodySender, ResponseBody};
pub use fetch::{FetchFailure, FetchRequest, FetchResponse, FetchTransport, RecordingFetch};
pub use xhr::{
    RecordingXhr, XhrBackend, XhrError, XhrRequest, XhrResponse, XhrResponseType,
    XhrResponseValue, XhrSignal,
};
