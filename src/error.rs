use std::path::PathBuf;

use thiserror::Error;

/// Failures while constructing the regressor or the embedding backend.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The checkpoint path does not exist.
    #[error("checkpoint not found: {}", .0.display())]
    NotFound(PathBuf),
    /// The checkpoint exists but could not be parsed.
    #[error("failed to read checkpoint {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: candle_core::Error,
    },
    /// A layer tensor required by the fixed topology is absent.
    #[error("checkpoint is missing tensor `{0}`")]
    MissingTensor(String),
    /// A layer tensor exists but its shape disagrees with the fixed topology.
    #[error("tensor `{name}` has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// A tensor could not be converted to f32 or moved to the target device.
    #[error("tensor `{name}` could not be prepared: {source}")]
    Tensor {
        name: String,
        source: candle_core::Error,
    },
    /// The requested device is not usable in this build or on this host.
    #[error("device unavailable: {0}")]
    Device(String),
    /// The embedding model file does not exist.
    #[error("embedding model not found: {}", .0.display())]
    EmbedderNotFound(PathBuf),
    /// ONNX Runtime refused to build a session for the embedding model.
    #[error("failed to initialize embedding model: {0}")]
    Embedder(String),
}

/// Failures surfaced by an embedding backend. Image decoding and runtime
/// errors are carried as-is so callers see the backend's own message.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Runtime(#[from] ort::Error),
    #[error("image has zero width or height")]
    EmptyImage,
    #[error("embedding model produced no output named `{0}`")]
    MissingOutput(String),
    #[error("unexpected embedding output shape {0:?}")]
    UnexpectedShape(Vec<usize>),
    #[error("pixel tensor holds {actual} values, shape requires {expected}")]
    PixelCount { expected: usize, actual: usize },
    #[error("embedding session lock poisoned")]
    Poisoned,
}

/// Errors returned by scoring calls.
#[derive(Debug, Error)]
pub enum AestheticError {
    #[error("model load failure: {0}")]
    Load(#[from] LoadError),
    /// Embedding width does not match the regressor input width.
    #[error("embedding has {actual} dimensions, regressor expects {expected}")]
    Dimension { expected: usize, actual: usize },
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    /// Tensor evaluation failed inside the regressor.
    #[error("inference failure: {0}")]
    Inference(#[from] candle_core::Error),
}
