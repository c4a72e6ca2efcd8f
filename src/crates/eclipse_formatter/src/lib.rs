//! Streams test-execution events from a running test suite to a listening IDE
//! over a length-prefixed, acknowledgment-gated TCP protocol.
//!
//! Reporting is best-effort: a missing listener, a goodbye from the peer, or
//! any I/O fault disables the session without affecting the test run.
//!
//! Typical usage:
//! ```no_run
//! use std::collections::BTreeMap;
//! use cucumber_eclipse_formatter::{EventEmitter, FinishedStep, FormatterHooks};
//!
//! let userdata = BTreeMap::new();
//! let mut emitter = EventEmitter::from_env(&userdata).expect("port should resolve");
//! emitter.on_feature_start("calculator");
//! emitter.on_scenario_start("adds two numbers");
//! emitter.on_step_finished(&FinishedStep::new("passed").with_duration_secs(0.25));
//! emitter.on_run_finished();
//! ```

mod config;
mod emitter;
mod endpoint;
mod envelope;
mod error;
mod frame;
mod status;
mod transport;

pub use config::{FormatterConfig, PORT_ENV_VAR, PORT_USERDATA_KEY};
pub use emitter::{EventEmitter, FinishedStep, FormatterHooks};
pub use endpoint::{AckMode, EndpointHandle, MessageEndpoint, ReceivedFrame};
pub use envelope::{Envelope, TestRunFinished, TestStepFinished, TestStepResult, Timestamp};
pub use error::{FormatterError, FormatterResult};
pub use frame::{
    decode, decode_ack, decode_payload, encode, terminate_frame, AckCode, Frame, GOOD_BY_MESSAGE,
    HANDLED_MESSAGE, LENGTH_PREFIX_LEN,
};
pub use status::{map_status, StepStatus};
pub use transport::{SessionState, Transport};
