use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};

use crate::error::DeviceError;

/// Pixel layouts a webcam is asked for, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Mjpeg,
    Yuyv,
}

impl PixelFormat {
    pub fn fourcc(&self) -> &'static [u8; 4] {
        match self {
            PixelFormat::Mjpeg => b"MJPG",
            PixelFormat::Yuyv => b"YUYV",
        }
    }

    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"MJPG" => Some(PixelFormat::Mjpeg),
            b"YUYV" => Some(PixelFormat::Yuyv),
            _ => None,
        }
    }
}

/// Turns one driver buffer into an image at the negotiated resolution.
pub fn decode_frame(
    format: PixelFormat,
    width: u32,
    height: u32,
    data: &[u8],
) -> Result<DynamicImage, DeviceError> {
    match format {
        PixelFormat::Mjpeg => image::load_from_memory_with_format(data, ImageFormat::Jpeg)
            .map_err(|e| DeviceError::Decode(e.to_string())),
        PixelFormat::Yuyv => yuyv_to_rgb(width, height, data),
    }
}

fn yuyv_to_rgb(width: u32, height: u32, data: &[u8]) -> Result<DynamicImage, DeviceError> {
    let expected = width as usize * height as usize * 2;
    if width % 2 != 0 || data.len() < expected {
        return Err(DeviceError::Decode(format!(
            "YUYV buffer of {} bytes does not fit {}x{}",
            data.len(),
            width,
            height
        )));
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for chunk in data[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| DeviceError::Decode("YUYV conversion size mismatch".to_string()))
}

// BT.601, studio range
fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = i32::from(y) - 16;
    let d = i32::from(u) - 128;
    let e = i32::from(v) - 128;
    let clamp = |x: i32| x.clamp(0, 255) as u8;
    [
        clamp((298 * c + 409 * e + 128) >> 8),
        clamp((298 * c - 100 * d - 208 * e + 128) >> 8),
        clamp((298 * c + 516 * d + 128) >> 8),
    ]
}
