use std::path::PathBuf;

use async_trait::async_trait;
use image::DynamicImage;
use tracing::debug;

use super::{CaptureConstraints, CaptureDevice};
use crate::error::DeviceError;

/// Reads the current frame from an image file that an external grabber keeps
/// overwriting (e.g. `fswebcam --loop`). Access is denied when the file cannot
/// be read at open time.
pub struct StillImageDevice {
    path: PathBuf,
    opened: bool,
}

impl StillImageDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            opened: false,
        }
    }
}

#[async_trait]
impl CaptureDevice for StillImageDevice {
    async fn open(&mut self, constraints: CaptureConstraints) -> Result<(), DeviceError> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            DeviceError::AccessDenied(format!("{}: {}", self.path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(DeviceError::AccessDenied(format!(
                "{} is not a file",
                self.path.display()
            )));
        }
        debug!(
            "Opened still image source {} (ideal {}x{} ignored)",
            self.path.display(),
            constraints.ideal_width,
            constraints.ideal_height
        );
        self.opened = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<DynamicImage, DeviceError> {
        if !self.opened {
            return Err(DeviceError::NoFrame);
        }
        image::open(&self.path).map_err(|e| DeviceError::Decode(e.to_string()))
    }

    fn release(&mut self) {
        self.opened = false;
    }

    fn name(&self) -> &str {
        "still-image"
    }
}
