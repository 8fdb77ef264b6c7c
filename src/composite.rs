// The encoded output of a composition

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::errors::DecodeError;
use crate::loader::decode_data_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    pub const JPEG_QUALITY: u8 = 90;

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

/// A finished, encoded composite. Cheap to clone, so a failed delivery can be
/// retried through another channel without recomposing.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    bytes: Bytes,
    format: OutputFormat,
    width: u32,
    height: u32,
}

impl Composite {
    pub fn new(bytes: Bytes, format: OutputFormat, width: u32, height: u32) -> Self {
        Composite {
            bytes,
            format,
            width,
            height,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            BASE64_STANDARD.encode(&self.bytes)
        )
    }

    /// Rebuild a composite from a data URL handed back by a client.
    pub fn from_data_url(reference: &str) -> Result<Self, DecodeError> {
        let bytes = decode_data_url(reference)?;
        let corrupt = |reason: String| DecodeError::Corrupt {
            reference: "composite".to_string(),
            reason,
        };

        let reader = image::io::Reader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| corrupt(e.to_string()))?;
        let format = match reader.format() {
            Some(image::ImageFormat::Png) => OutputFormat::Png,
            Some(image::ImageFormat::Jpeg) => OutputFormat::Jpeg,
            other => return Err(corrupt(format!("unsupported composite format {:?}", other))),
        };
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| corrupt(e.to_string()))?;

        Ok(Composite::new(Bytes::from(bytes), format, width, height))
    }
}
