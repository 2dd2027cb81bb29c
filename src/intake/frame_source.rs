use image::RgbImage;
use tracing::{debug, info, warn};

use crate::common::Snapshot;
use crate::error::DeviceError;
use crate::intake::device::{CaptureConstraints, CaptureDevice};

/// Owns the capture device. A device granted by `open` is released exactly
/// once, by `close` or on drop.
pub struct FrameSource {
    device: Box<dyn CaptureDevice>,
    constraints: CaptureConstraints,
    jpeg_quality: u8,
    granted: bool,
}

impl FrameSource {
    pub fn new(device: Box<dyn CaptureDevice>, constraints: CaptureConstraints, jpeg_quality: u8) -> Self {
        Self {
            device,
            constraints,
            jpeg_quality,
            granted: false,
        }
    }

    /// Requests device access. Opening an already granted device is a no-op.
    pub async fn open(&mut self) -> Result<(), DeviceError> {
        if self.granted {
            return Ok(());
        }
        info!("Requesting access to {}", self.device.name());
        match self.device.open(self.constraints).await {
            Ok(()) => {
                self.granted = true;
                info!("Access granted to {}", self.device.name());
                Ok(())
            }
            Err(e) => {
                warn!("Access to {} refused: {}", self.device.name(), e);
                Err(match e {
                    DeviceError::AccessDenied(_) => e,
                    other => DeviceError::AccessDenied(other.to_string()),
                })
            }
        }
    }

    /// Samples the live feed into a JPEG snapshot. Returns `None` when the
    /// device is not open or yields no usable frame.
    pub fn capture(&mut self) -> Option<Snapshot> {
        if !self.granted {
            debug!("Capture requested with no open device");
            return None;
        }
        let frame = match self.device.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                debug!("No frame captured: {}", e);
                return None;
            }
        };
        match Snapshot::encode(&frame, self.jpeg_quality) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!("Failed to encode frame: {}", e);
                None
            }
        }
    }

    /// An RGB frame for on-screen display, shrunk to fit the bounds. Nothing is encoded.
    pub fn preview(&mut self, max_width: u32, max_height: u32) -> Option<RgbImage> {
        if !self.granted {
            return None;
        }
        match self.device.read_frame() {
            Ok(frame) if frame.width() > max_width || frame.height() > max_height => {
                Some(frame.thumbnail(max_width, max_height).to_rgb8())
            }
            Ok(frame) => Some(frame.to_rgb8()),
            Err(e) => {
                debug!("No preview frame: {}", e);
                None
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.granted
    }

    pub fn close(&mut self) {
        if self.granted {
            self.granted = false;
            self.device.release();
            info!("Released {}", self.device.name());
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.close();
    }
}
