use std::path::Path;

use image::DynamicImage;

use crate::error::EmbeddingError;

/// A decoded input image, ready for an embedder's preprocessing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage(DynamicImage);

impl RawImage {
    /// Decode an image file; the format is guessed from its contents.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EmbeddingError> {
        let decoded = image::ImageReader::open(path)
            .map_err(image::ImageError::IoError)?
            .with_guessed_format()
            .map_err(image::ImageError::IoError)?
            .decode()?;
        Ok(Self(decoded))
    }

    /// Decode an in-memory encoded image (PNG, JPEG, WebP).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EmbeddingError> {
        Ok(Self(image::load_from_memory(bytes)?))
    }

    pub fn as_image(&self) -> &DynamicImage {
        &self.0
    }

    pub fn into_inner(self) -> DynamicImage {
        self.0
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }
}

impl From<DynamicImage> for RawImage {
    fn from(value: DynamicImage) -> Self {
        Self(value)
    }
}
