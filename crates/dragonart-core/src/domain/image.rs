//! Encoded image payloads.

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::{DragonArtError, Result};

/// An encoded image (PNG, JPEG, ...) together with its MIME type.
///
/// Payloads are immutable and shared; cloning is cheap. On the wire and in
/// snapshots an image is a `data:<mime>;base64,<payload>` URL.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    mime: String,
    bytes: Arc<[u8]>,
}

impl ImageData {
    pub fn new(mime: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Wrap raw file bytes, detecting the format from the magic number.
    pub fn from_encoded(bytes: Vec<u8>) -> Result<Self> {
        let format = image::guess_format(&bytes)?;
        Ok(Self::new(format.to_mime_type(), bytes))
    }

    /// Parse a `data:` URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| DragonArtError::InvalidImage("missing data: prefix".into()))?;
        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| DragonArtError::InvalidImage("expected base64 data URL".into()))?;
        if mime.is_empty() {
            return Err(DragonArtError::InvalidImage("missing MIME type".into()));
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| DragonArtError::InvalidImage(e.to_string()))?;
        Ok(Self::new(mime, bytes))
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(self.bytes())
        )
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the payload claims to be a raster image.
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    /// File extension used when writing the payload to disk.
    pub fn extension(&self) -> &'static str {
        match self.mime.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "bin",
        }
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageData({}, {} bytes)", self.mime, self.bytes.len())
    }
}

impl Serialize for ImageData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for ImageData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let url = String::deserialize(deserializer)?;
        ImageData::from_data_url(&url).map_err(serde::de::Error::custom)
    }
}
