use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use image::{DynamicImage, codecs::jpeg::JpegEncoder};
use uuid::Uuid;

use crate::error::DeviceError;

pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// A still image sampled from the live feed, held as a data URI
/// (`data:image/jpeg;base64,<payload>`).
#[derive(Debug, Clone)]
pub struct Snapshot {
    id: Uuid,
    data_uri: String,
    width: u32,
    height: u32,
    captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Encodes `image` as JPEG at its native resolution.
    pub fn encode(image: &DynamicImage, quality: u8) -> Result<Self, DeviceError> {
        let rgb = image.to_rgb8();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality)
            .encode_image(&rgb)
            .map_err(|e| DeviceError::Decode(e.to_string()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            data_uri: format!(
                "data:{};base64,{}",
                JPEG_MIME_TYPE,
                BASE64_STANDARD.encode(&bytes)
            ),
            width: rgb.width(),
            height: rgb.height(),
            captured_at: Utc::now(),
        })
    }

    /// Wraps an already-encoded payload, with or without the data URI prefix.
    pub fn from_data_uri(data_uri: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            data_uri: data_uri.into(),
            width,
            height,
            captured_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    /// The raw base64 bytes with any `data:...,` prefix stripped.
    pub fn payload(&self) -> &str {
        strip_data_uri_prefix(&self.data_uri)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

pub fn strip_data_uri_prefix(data: &str) -> &str {
    match data.split_once(',') {
        Some((_, payload)) if !payload.is_empty() => payload,
        _ => data,
    }
}
