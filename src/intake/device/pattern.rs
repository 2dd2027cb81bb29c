use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, Rgb};

use super::{CaptureConstraints, CaptureDevice};
use crate::error::DeviceError;

/// Synthetic colour-bar test card at the requested resolution.
pub struct PatternDevice {
    size: Option<(u32, u32)>,
    frame_counter: u32,
}

impl PatternDevice {
    pub fn new() -> Self {
        Self {
            size: None,
            frame_counter: 0,
        }
    }
}

impl Default for PatternDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for PatternDevice {
    async fn open(&mut self, constraints: CaptureConstraints) -> Result<(), DeviceError> {
        self.size = Some((constraints.ideal_width, constraints.ideal_height));
        Ok(())
    }

    fn read_frame(&mut self) -> Result<DynamicImage, DeviceError> {
        let (width, height) = self.size.ok_or(DeviceError::NoFrame)?;
        self.frame_counter = self.frame_counter.wrapping_add(1);
        let shift = u64::from(self.frame_counter);
        let (w, h) = (u64::from(width.max(1)), u64::from(height.max(1)));
        let image = ImageBuffer::from_fn(width, height, |x, y| {
            // 8 vertical bands scrolling one pixel per frame
            let band = ((u64::from(x) + shift) % w * 8 / w) as u8;
            let shade = (u64::from(y) * 255 / h) as u8;
            Rgb([band * 32, shade, 255 - band * 16])
        });
        Ok(DynamicImage::ImageRgb8(image))
    }

    fn release(&mut self) {
        self.size = None;
    }

    fn name(&self) -> &str {
        "test-pattern"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_frames_at_requested_resolution() {
        let mut device = PatternDevice::new();
        assert_eq!(device.read_frame().unwrap_err(), DeviceError::NoFrame);

        device
            .open(CaptureConstraints {
                ideal_width: 32,
                ideal_height: 18,
            })
            .await
            .unwrap();
        let frame = device.read_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 18));

        device.release();
        assert!(device.read_frame().is_err());
    }
}
