use async_trait::async_trait;
use image::DynamicImage;
use tracing::{debug, info};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC, Format};

use super::pixel::{PixelFormat, decode_frame};
use super::{CaptureConstraints, CaptureDevice};
use crate::error::DeviceError;

const BUFFER_COUNT: u32 = 4;

/// A Video4Linux camera (`/dev/video<index>`), streamed through mmap buffers.
pub struct WebcamDevice {
    index: usize,
    name: String,
    stream: Option<Stream<'static>>,
    device: Option<Device>,
    format: Option<(PixelFormat, u32, u32)>,
}

impl WebcamDevice {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            name: format!("/dev/video{}", index),
            stream: None,
            device: None,
            format: None,
        }
    }

    fn negotiate(
        device: &Device,
        constraints: CaptureConstraints,
    ) -> Result<(PixelFormat, u32, u32), DeviceError> {
        for wanted in [PixelFormat::Mjpeg, PixelFormat::Yuyv] {
            let request = Format::new(
                constraints.ideal_width,
                constraints.ideal_height,
                FourCC::new(wanted.fourcc()),
            );
            let actual = match device.set_format(&request) {
                Ok(actual) => actual,
                Err(e) => {
                    debug!("Format {:?} refused: {}", wanted, e);
                    continue;
                }
            };
            if let Some(format) = PixelFormat::from_fourcc(&actual.fourcc.repr) {
                return Ok((format, actual.width, actual.height));
            }
        }
        Err(DeviceError::AccessDenied(
            "camera offers neither MJPG nor YUYV".to_string(),
        ))
    }
}

#[async_trait]
impl CaptureDevice for WebcamDevice {
    async fn open(&mut self, constraints: CaptureConstraints) -> Result<(), DeviceError> {
        let device = Device::new(self.index)
            .map_err(|e| DeviceError::AccessDenied(format!("{}: {}", self.name, e)))?;
        let format = Self::negotiate(&device, constraints)?;
        let stream = Stream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| DeviceError::AccessDenied(format!("{}: {}", self.name, e)))?;

        info!(
            "{} streaming {:?} at {}x{}",
            self.name, format.0, format.1, format.2
        );
        self.format = Some(format);
        self.stream = Some(stream);
        self.device = Some(device);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<DynamicImage, DeviceError> {
        let (Some(stream), Some((format, width, height))) = (self.stream.as_mut(), self.format)
        else {
            return Err(DeviceError::NoFrame);
        };
        let (buffer, meta) = stream.next().map_err(|e| {
            debug!("Dequeue failed: {}", e);
            DeviceError::NoFrame
        })?;
        let used = (meta.bytesused as usize).min(buffer.len());
        if used == 0 {
            return Err(DeviceError::NoFrame);
        }
        decode_frame(format, width, height, &buffer[..used])
    }

    fn release(&mut self) {
        // stop streaming before the device handle goes
        self.stream = None;
        self.device = None;
        self.format = None;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unopened_camera_has_no_frames() {
        let mut device = WebcamDevice::new(7);
        assert_eq!(device.name(), "/dev/video7");
        assert_eq!(device.read_frame().unwrap_err(), DeviceError::NoFrame);
        device.release();
    }

    #[tokio::test]
    async fn missing_camera_is_access_denied() {
        let mut device = WebcamDevice::new(4096);
        let result = device.open(CaptureConstraints::default()).await;
        assert!(matches!(result, Err(DeviceError::AccessDenied(_))));
    }
}
