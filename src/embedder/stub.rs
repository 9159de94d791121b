use fxhash::hash64;
use image::DynamicImage;

use super::{ImageEmbedder, PixelTensor, clip_preprocess};
use crate::error::EmbeddingError;
use crate::regressor::EMBEDDING_DIM;

/// Deterministic stand-in for the real backbone. Generates sinusoid values
/// derived from a hash of the preprocessed pixels, so identical images map to
/// identical vectors with no model files on disk.
#[derive(Debug, Clone)]
pub struct StubEmbedder {
    image_size: u32,
    embedding_dim: usize,
}

impl StubEmbedder {
    pub fn new(image_size: u32, embedding_dim: usize) -> Self {
        Self {
            image_size,
            embedding_dim,
        }
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new(32, EMBEDDING_DIM)
    }
}

impl ImageEmbedder for StubEmbedder {
    fn preprocess(&self, image: &DynamicImage) -> Result<PixelTensor, EmbeddingError> {
        clip_preprocess(image, self.image_size)
    }

    fn embed(&self, pixels: PixelTensor) -> Result<Vec<f32>, EmbeddingError> {
        let h = hash64(bytemuck::cast_slice::<f32, u8>(pixels.data()));
        let v = (0..self.embedding_dim)
            .map(|idx| ((h >> (idx % 32)) as f32 * 0.0001).sin())
            .collect();
        Ok(v)
    }

    fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn name(&self) -> &str {
        "stub"
    }
}
