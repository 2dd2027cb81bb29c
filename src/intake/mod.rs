pub mod device;
pub mod frame_source;

pub use device::{CaptureConstraints, CaptureDevice, PatternDevice, StillImageDevice};
#[cfg(all(target_os = "linux", feature = "webcam"))]
pub use device::WebcamDevice;
pub use frame_source::FrameSource;
