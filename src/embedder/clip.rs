use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::Tensor;
use tracing::{debug, info};

use super::{ImageEmbedder, PixelTensor, clip_preprocess};
use crate::config::EmbedderConfig;
use crate::device::Device;
use crate::error::{EmbeddingError, LoadError};

/// Output name exported for projected image features by the usual CLIP
/// vision-with-projection graphs.
const IMAGE_EMBEDS: &str = "image_embeds";

/// CLIP vision tower exported to ONNX, run through ONNX Runtime.
///
/// Running an `ort` session needs exclusive access, so the session sits behind
/// a mutex; concurrent callers serialize on the embed step only.
pub struct ClipImageEmbedder {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    image_size: u32,
    embedding_dim: usize,
    device: Device,
}

impl ClipImageEmbedder {
    /// Build a session for the model at `cfg.model_path` on `device`.
    pub fn load(cfg: &EmbedderConfig, device: Device) -> Result<Self, LoadError> {
        let model_path = cfg
            .model_path
            .as_deref()
            .ok_or_else(|| LoadError::Embedder("embedder.model_path is not set".into()))?;
        if !model_path.exists() {
            return Err(LoadError::EmbedderNotFound(model_path.to_path_buf()));
        }

        let session = build_session(model_path, cfg.intra_threads, device)?;

        let input_name = match &cfg.input_name {
            Some(name) => name.clone(),
            None => session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or_else(|| LoadError::Embedder("model declares no inputs".into()))?,
        };

        let output_name = resolve_output_name(
            session.outputs.iter().map(|output| output.name.as_str()),
            cfg.output_name.as_deref(),
        )
        .ok_or_else(|| LoadError::Embedder("model declares no outputs".into()))?;

        let declared = session
            .outputs
            .iter()
            .find(|output| output.name == output_name)
            .and_then(|output| output.output_type.tensor_shape());
        if let Some(dims) = declared {
            check_declared_width(&output_name, dims, cfg.embedding_dim)?;
        }

        info!(
            model = %model_path.display(),
            input = %input_name,
            output = %output_name,
            device = %device,
            threads = cfg.intra_threads,
            "embedder_loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            image_size: cfg.image_size,
            embedding_dim: cfg.embedding_dim,
            device,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

impl ImageEmbedder for ClipImageEmbedder {
    fn preprocess(&self, image: &DynamicImage) -> Result<PixelTensor, EmbeddingError> {
        clip_preprocess(image, self.image_size)
    }

    fn embed(&self, pixels: PixelTensor) -> Result<Vec<f32>, EmbeddingError> {
        let (shape, data) = pixels.into_parts();
        let input = Tensor::from_array((shape.to_vec(), data))?;

        let mut session = self.session.lock().map_err(|_| EmbeddingError::Poisoned)?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input])?;
        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| EmbeddingError::MissingOutput(self.output_name.clone()))?;

        let (shape, values) = output.try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        debug!(shape = ?dims, "embedder_output");
        flatten_single(&dims, values)
    }

    fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    fn name(&self) -> &str {
        "clip-onnx"
    }
}

fn build_session(model_path: &Path, threads: usize, device: Device) -> Result<Session, LoadError> {
    let builder = Session::builder()
        .map_err(|e| LoadError::Embedder(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| LoadError::Embedder(e.to_string()))?
        .with_intra_threads(threads)
        .map_err(|e| LoadError::Embedder(e.to_string()))?;

    with_device(builder, device)?
        .commit_from_file(model_path)
        .map_err(|e| LoadError::Embedder(format!("{}: {e}", model_path.display())))
}

#[cfg(feature = "cuda")]
fn with_device(builder: SessionBuilder, device: Device) -> Result<SessionBuilder, LoadError> {
    use ort::execution_providers::CUDAExecutionProvider;

    match device {
        Device::Cpu => Ok(builder),
        Device::Cuda(ordinal) => builder
            .with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(ordinal as i32)
                .build()
                .error_on_failure()])
            .map_err(|e| LoadError::Device(format!("{device}: {e}"))),
    }
}

#[cfg(not(feature = "cuda"))]
fn with_device(builder: SessionBuilder, device: Device) -> Result<SessionBuilder, LoadError> {
    match device {
        Device::Cpu => Ok(builder),
        Device::Cuda(_) => Err(LoadError::Device(format!(
            "{device}: built without the `cuda` feature"
        ))),
    }
}

/// Pick the embedding output: an explicit name wins, then `image_embeds`,
/// then whatever the graph lists first.
fn resolve_output_name<'a>(
    mut available: impl Iterator<Item = &'a str> + Clone,
    configured: Option<&str>,
) -> Option<String> {
    if let Some(name) = configured {
        return Some(name.to_string());
    }
    if available.clone().any(|name| name == IMAGE_EMBEDS) {
        return Some(IMAGE_EMBEDS.to_string());
    }
    available.next().map(str::to_string)
}

/// Reject a graph whose output's last axis is fixed to a width other than
/// `expected`. Symbolic axes (negative in the graph metadata) pass.
fn check_declared_width(output: &str, dims: &[i64], expected: usize) -> Result<(), LoadError> {
    match dims.last() {
        Some(&width) if width > 0 && width as usize != expected => Err(LoadError::Embedder(
            format!("output `{output}` is {width} wide, configured embedding_dim is {expected}"),
        )),
        _ => Ok(()),
    }
}

/// Accept `[dim]` or `[1, dim]`; anything else means the graph is not a
/// pooled single-image embedder.
fn flatten_single(dims: &[usize], values: &[f32]) -> Result<Vec<f32>, EmbeddingError> {
    match dims {
        [_] | [1, _] => Ok(values.to_vec()),
        _ => Err(EmbeddingError::UnexpectedShape(dims.to_vec())),
    }
}
