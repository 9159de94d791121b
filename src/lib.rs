//! Image aesthetic scoring.
//!
//! A frozen CLIP image embedding is L2-normalized and fed through a small
//! learned regression head that outputs one scalar rating:
//!
//! ```text
//! image → preprocess → embed (768-d) → L2 normalize → regressor → score
//! ```
//!
//! [`AestheticPredictor`] owns both halves. Build it once with
//! [`AestheticPredictor::load`]; every call after that is read-only, so one
//! predictor can be shared between threads.
//!
//! ## Quick example
//!
//! ```no_run
//! use aesthetic_score::{AestheticConfig, AestheticPredictor, RawImage};
//!
//! let cfg = AestheticConfig::from_file("aesthetic.yaml")?;
//! let predictor = AestheticPredictor::load(&cfg)?;
//! let score = predictor.predict(&RawImage::open("photo.jpg")?)?;
//! println!("{score:.3}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod device;
pub mod embedder;
pub mod error;
pub mod normalize;
pub mod raw_image;
pub mod regressor;

pub use crate::config::{AestheticConfig, ConfigLoadError, EmbedderBackend, EmbedderConfig};
pub use crate::device::Device;
pub use crate::embedder::{ClipImageEmbedder, ImageEmbedder, PixelTensor, StubEmbedder};
pub use crate::error::{AestheticError, EmbeddingError, LoadError};
pub use crate::normalize::{l2_normalize, l2_normalize_in_place};
pub use crate::raw_image::RawImage;
pub use crate::regressor::{EMBEDDING_DIM, Regressor};

use std::time::Instant;

use image::DynamicImage;
use tracing::{Level, info, warn};

/// Embedding service and regression head, placed on one device.
pub struct AestheticPredictor {
    regressor: Regressor,
    embedder: Box<dyn ImageEmbedder>,
}

impl AestheticPredictor {
    /// Build the regressor and the configured embedder on `cfg.device`.
    pub fn load(cfg: &AestheticConfig) -> Result<Self, AestheticError> {
        let regressor = Regressor::load(&cfg.regressor.weights_path, cfg.device)?;
        let embedder: Box<dyn ImageEmbedder> = match cfg.embedder.backend {
            EmbedderBackend::Onnx => Box::new(ClipImageEmbedder::load(&cfg.embedder, cfg.device)?),
            EmbedderBackend::Stub => Box::new(StubEmbedder::new(
                cfg.embedder.image_size,
                cfg.embedder.embedding_dim,
            )),
        };
        Self::from_boxed(regressor, embedder)
    }

    /// Assemble from parts. Fails with [`AestheticError::Dimension`] when the
    /// embedder's width does not match the regressor's input.
    pub fn new(
        regressor: Regressor,
        embedder: impl ImageEmbedder + 'static,
    ) -> Result<Self, AestheticError> {
        Self::from_boxed(regressor, Box::new(embedder))
    }

    fn from_boxed(
        regressor: Regressor,
        embedder: Box<dyn ImageEmbedder>,
    ) -> Result<Self, AestheticError> {
        if embedder.embedding_dim() != regressor.input_dim() {
            return Err(AestheticError::Dimension {
                expected: regressor.input_dim(),
                actual: embedder.embedding_dim(),
            });
        }
        info!(
            embedder = embedder.name(),
            device = %regressor.device(),
            "predictor_ready"
        );
        Ok(Self {
            regressor,
            embedder,
        })
    }

    /// Score one image.
    pub fn predict(&self, image: &RawImage) -> Result<f32, AestheticError> {
        self.predict_image(image.as_image())
    }

    /// Score an already decoded image. Preprocessing and embedding errors are
    /// returned exactly as the embedder produced them.
    pub fn predict_image(&self, image: &DynamicImage) -> Result<f32, AestheticError> {
        let start = Instant::now();
        let span = tracing::span!(
            Level::INFO,
            "aesthetic.predict",
            embedder = self.embedder.name(),
            width = image.width(),
            height = image.height()
        );
        let _guard = span.enter();

        match self.predict_inner(image) {
            Ok(score) => {
                let elapsed_micros = start.elapsed().as_micros();
                info!(score, elapsed_micros, "predict_success");
                Ok(score)
            }
            Err(err) => {
                let elapsed_micros = start.elapsed().as_micros();
                warn!(error = %err, elapsed_micros, "predict_failure");
                Err(err)
            }
        }
    }

    fn predict_inner(&self, image: &DynamicImage) -> Result<f32, AestheticError> {
        let pixels = self.embedder.preprocess(image)?;
        let embedding = self.embedder.embed(pixels)?;
        self.predict_embedding(&embedding)
    }

    /// Normalize a raw (unnormalized) embedding and score it.
    pub fn predict_embedding(&self, embedding: &[f32]) -> Result<f32, AestheticError> {
        let normalized = l2_normalize(embedding);
        self.regressor.predict(&normalized)
    }

    /// Device both halves were placed on.
    pub fn device(&self) -> Device {
        self.regressor.device()
    }

    pub fn regressor(&self) -> &Regressor {
        &self.regressor
    }

    pub fn embedder(&self) -> &dyn ImageEmbedder {
        self.embedder.as_ref()
    }
}
