mod auto_capture;
pub mod orchestrator;
pub mod preview;
pub mod state;
pub mod store;

pub use orchestrator::{CaptureOrchestrator, CaptureOutcome, CaptureTrigger};
pub use preview::PreviewFrame;
pub use state::{CaptureState, DevicePhase};
pub use store::{ResultStore, SkipReason};
