pub mod recording_context;
pub mod recording_runtime;
pub mod test_hub;

pub use collaborators::{RecordingScheduler, RecordingSink, StaticAuthenticator, StaticPolicy, Verdict};
pub use recording_context::RecordingContext;
pub use recording_runtime::RecordingRuntime;
pub use recording_transport::RecordingTransport;
pub use test_hub::{init_logging, pump_downlink, pump_uplink, TestHub, HOST_URI, REMOTE_ADDRESS};
