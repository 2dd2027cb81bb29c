mod pattern;
pub mod pixel;
mod still_image;
#[cfg(all(target_os = "linux", feature = "webcam"))]
mod webcam;

pub use pattern::PatternDevice;
pub use still_image::StillImageDevice;
#[cfg(all(target_os = "linux", feature = "webcam"))]
pub use webcam::WebcamDevice;

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::DeviceError;

/// Resolution hint passed when access is requested. Devices may ignore it and
/// deliver their native resolution instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
        }
    }
}

/// A camera-like device. `open` may suspend while access is being granted.
#[async_trait]
pub trait CaptureDevice: Send {
    async fn open(&mut self, constraints: CaptureConstraints) -> Result<(), DeviceError>;

    /// Samples the live feed. Only called between a successful `open` and `release`.
    fn read_frame(&mut self) -> Result<DynamicImage, DeviceError>;

    fn release(&mut self);

    fn name(&self) -> &str;
}
