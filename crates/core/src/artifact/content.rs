use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use atelier_llm::{AspectRatio, DEFAULT_IMAGE_CONTENT_TYPE, ImagePayload};
use image::ImageReader;

/// One image in a version history.
///
/// The aspect-ratio class is derived from the image header when the artifact is
/// built and never recomputed. Bytes are shared, so cloning is cheap.
#[derive(Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Arc<[u8]>,
    content_type: String,
    dimensions: Option<(u32, u32)>,
    aspect_ratio: AspectRatio,
}

impl Artifact {
    pub fn new(bytes: impl Into<Arc<[u8]>>, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into().trim().to_string();
        let bytes = bytes.into();
        let dimensions = read_dimensions(&bytes);
        let aspect_ratio = dimensions
            .map(|(width, height)| AspectRatio::closest(width, height))
            .unwrap_or_default();

        Self {
            bytes,
            content_type: if content_type.is_empty() {
                DEFAULT_IMAGE_CONTENT_TYPE.to_string()
            } else {
                content_type
            },
            dimensions,
            aspect_ratio,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Pixel size, when the header could be read.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    /// Copies the artifact into a provider payload, e.g. as the base of an edit.
    pub fn to_payload(&self) -> ImagePayload {
        ImagePayload::new(self.bytes.to_vec(), self.content_type.clone())
    }
}

impl From<ImagePayload> for Artifact {
    fn from(payload: ImagePayload) -> Self {
        Artifact::new(payload.bytes, payload.content_type)
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Artifact")
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .field("dimensions", &self.dimensions)
            .field("aspect_ratio", &self.aspect_ratio)
            .finish()
    }
}

fn read_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    match reader.into_dimensions() {
        Ok(dimensions) => Some(dimensions),
        Err(error) => {
            tracing::debug!(error = %error, "could not read image dimensions");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encodes a blank PNG of the given size.
    pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image::DynamicImage::new_rgba8(width, height)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .expect("png encodes");
        bytes.into_inner()
    }

    #[test]
    fn aspect_ratio_is_derived_from_the_header() {
        let artifact = Artifact::new(png(32, 18), "image/png");
        assert_eq!(artifact.dimensions(), Some((32, 18)));
        assert_eq!(artifact.aspect_ratio(), AspectRatio::Landscape);
    }

    #[test]
    fn unreadable_bytes_default_to_square() {
        let artifact = Artifact::new(vec![1, 2, 3, 4], "");
        assert_eq!(artifact.dimensions(), None);
        assert_eq!(artifact.aspect_ratio(), AspectRatio::Square);
        assert_eq!(artifact.content_type(), "image/png");
    }

    #[test]
    fn payload_round_trip_keeps_content_type() {
        let artifact = Artifact::from(ImagePayload::new(png(30, 40), "image/png"));
        let payload = artifact.to_payload();
        assert_eq!(payload.content_type, "image/png");
        assert_eq!(payload.bytes, artifact.bytes());
        assert_eq!(artifact.aspect_ratio(), AspectRatio::Tall);
    }
}
