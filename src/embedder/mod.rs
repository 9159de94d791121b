//! Image embedding backends.
//!
//! The backbone is an external pretrained model; this crate only drives it.
//! [`ImageEmbedder`] is the seam: a backend owns its own preprocessing
//! contract and turns the resulting pixel tensor into a raw (unnormalized)
//! embedding.
//!
//! - [`ClipImageEmbedder`] runs an exported CLIP vision tower through ONNX Runtime.
//! - [`StubEmbedder`] derives a deterministic vector from the pixels, for dry
//!   runs and tests without model files.

mod clip;
mod preprocess;
mod stub;

pub use clip::ClipImageEmbedder;
pub use preprocess::{CLIP_IMAGE_MEAN, CLIP_IMAGE_STD, clip_preprocess};
pub use stub::StubEmbedder;

use image::DynamicImage;

use crate::error::EmbeddingError;

/// Dense NCHW f32 tensor handed from preprocessing to the backbone.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTensor {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl PixelTensor {
    pub fn new(shape: [usize; 4], data: Vec<f32>) -> Result<Self, EmbeddingError> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(EmbeddingError::PixelCount {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_parts(self) -> ([usize; 4], Vec<f32>) {
        (self.shape, self.data)
    }
}

/// An embedding service: preprocessing plus embedding extraction.
///
/// Implementations must be usable from several threads at once; the pipeline
/// shares one instance across callers.
pub trait ImageEmbedder: Send + Sync {
    /// Convert a decoded image into the tensor layout the backbone expects.
    fn preprocess(&self, image: &DynamicImage) -> Result<PixelTensor, EmbeddingError>;

    /// Run the backbone. The returned vector is not normalized.
    fn embed(&self, pixels: PixelTensor) -> Result<Vec<f32>, EmbeddingError>;

    /// Width of the vectors [`embed`](Self::embed) returns.
    fn embedding_dim(&self) -> usize;

    /// Short label for logs.
    fn name(&self) -> &str;
}
