use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, Snafu};

pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ModelOptionError {
    #[snafu(display("unknown aspect ratio '{raw}'"))]
    UnknownAspectRatio { raw: String },
    #[snafu(display("unknown image size '{raw}'"))]
    UnknownImageSize { raw: String },
}

/// Output shape requested from the image model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "3:4")]
    Tall,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Standard,
        AspectRatio::Tall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Standard => "4:3",
            AspectRatio::Tall => "3:4",
        }
    }

    /// Width divided by height.
    pub fn value(&self) -> f64 {
        match self {
            AspectRatio::Square => 1.0,
            AspectRatio::Landscape => 16.0 / 9.0,
            AspectRatio::Portrait => 9.0 / 16.0,
            AspectRatio::Standard => 4.0 / 3.0,
            AspectRatio::Tall => 3.0 / 4.0,
        }
    }

    /// Picks the supported ratio closest to the given pixel dimensions.
    ///
    /// Distance is measured on the log scale so that 2:1 and 1:2 are treated
    /// symmetrically. Degenerate dimensions map to `1:1`.
    pub fn closest(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return AspectRatio::Square;
        }

        let actual = (f64::from(width) / f64::from(height)).ln();
        Self::ALL
            .into_iter()
            .min_by(|left, right| {
                let left_distance = (left.value().ln() - actual).abs();
                let right_distance = (right.value().ln() - actual).abs();
                left_distance.total_cmp(&right_distance)
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = ModelOptionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == trimmed)
            .context(UnknownAspectRatioSnafu { raw: trimmed })
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = ModelOptionError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

/// Resolution tier requested from the image model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::OneK => "1K",
            ImageSize::TwoK => "2K",
            ImageSize::FourK => "4K",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = ModelOptionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "1K" => Ok(ImageSize::OneK),
            "2K" => Ok(ImageSize::TwoK),
            "4K" => Ok(ImageSize::FourK),
            _ => UnknownImageSizeSnafu { raw: raw.trim() }.fail(),
        }
    }
}

impl TryFrom<String> for ImageSize {
    type Error = ModelOptionError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

/// Raw image bytes plus the content type the service reported for them.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into().trim().to_string();
        Self {
            bytes,
            content_type: if content_type.is_empty() {
                DEFAULT_IMAGE_CONTENT_TYPE.to_string()
            } else {
                content_type
            },
        }
    }
}

// Image bodies are large; keep debug output readable.
impl fmt::Debug for ImagePayload {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ImagePayload")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}
