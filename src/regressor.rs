//! The learned regression head.
//!
//! Five dense layers, `768 → 1024 → 128 → 64 → 16 → 1`, with no activations in
//! between. The trained head interleaves dropout after the first three layers;
//! dropout is identity at inference so it is not evaluated here, but it still
//! shifts the layer indices used in checkpoint names (`layers.0`, `layers.2`,
//! `layers.4`, `layers.6`, `layers.7`).

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Module, Tensor};
use candle_nn::Linear;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{AestheticError, LoadError};

/// Width of the CLIP ViT-L/14 image embedding the head was trained on.
pub const EMBEDDING_DIM: usize = 768;

/// `(checkpoint index, in_features, out_features)` per dense layer.
pub const LAYOUT: [(usize, usize, usize); 5] = [
    (0, EMBEDDING_DIM, 1024),
    (2, 1024, 128),
    (4, 128, 64),
    (6, 64, 16),
    (7, 16, 1),
];

const PREFIX: &str = "layers";

/// On-disk encoding of a head checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointFormat {
    Safetensors,
    /// A PyTorch state dict written by `torch.save`.
    Pickle,
}

impl CheckpointFormat {
    /// `.pth`, `.pt` and `.bin` are PyTorch pickles; anything else is read as
    /// safetensors.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pth" | "pt" | "bin") => Self::Pickle,
            _ => Self::Safetensors,
        }
    }

    fn read(
        self,
        path: &Path,
        device: &candle_core::Device,
    ) -> candle_core::Result<HashMap<String, Tensor>> {
        match self {
            Self::Safetensors => candle_core::safetensors::load(path, device),
            // Pickled tensors land on the CPU; `take_tensor` moves them.
            Self::Pickle => Ok(candle_core::pickle::read_all(path)?.into_iter().collect()),
        }
    }
}

/// Checkpoint key of the weight tensor for the layer at `index`.
pub fn weight_key(index: usize) -> String {
    format!("{PREFIX}.{index}.weight")
}

/// Checkpoint key of the bias tensor for the layer at `index`.
pub fn bias_key(index: usize) -> String {
    format!("{PREFIX}.{index}.bias")
}

/// Embedding → score regression head. Immutable once built, so one instance
/// can be shared across threads.
#[derive(Debug, Clone)]
pub struct Regressor {
    layers: Vec<Linear>,
    device: Device,
    candle_device: candle_core::Device,
}

impl Regressor {
    /// Load weights onto `device` from a safetensors file or a PyTorch state
    /// dict, chosen by [`CheckpointFormat::from_path`].
    pub fn load(weights_path: impl AsRef<Path>, device: Device) -> Result<Self, LoadError> {
        let path = weights_path.as_ref();
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        let candle_device = device.to_candle()?;
        let format = CheckpointFormat::from_path(path);
        let tensors = format
            .read(path, &candle_device)
            .map_err(|source| LoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let regressor = Self::from_tensors(tensors, device)?;
        info!(
            path = %path.display(),
            format = ?format,
            device = %device,
            parameters = regressor.parameter_count(),
            "regressor_loaded"
        );
        Ok(regressor)
    }

    /// Build from an in-memory tensor map keyed like a checkpoint.
    ///
    /// Every tensor named by [`LAYOUT`] must be present with the exact shape
    /// the topology requires. Other dtypes are converted to f32; unrelated
    /// entries are ignored.
    pub fn from_tensors(
        mut tensors: HashMap<String, Tensor>,
        device: Device,
    ) -> Result<Self, LoadError> {
        let candle_device = device.to_candle()?;
        let mut layers = Vec::with_capacity(LAYOUT.len());

        for &(index, input, output) in &LAYOUT {
            let weight = take_tensor(
                &mut tensors,
                &weight_key(index),
                &[output, input],
                &candle_device,
            )?;
            let bias = take_tensor(&mut tensors, &bias_key(index), &[output], &candle_device)?;
            layers.push(Linear::new(weight, Some(bias)));
        }

        if !tensors.is_empty() {
            let mut unused: Vec<&String> = tensors.keys().collect();
            unused.sort();
            debug!(unused = ?unused, "checkpoint_extra_tensors");
        }

        Ok(Self {
            layers,
            device,
            candle_device,
        })
    }

    /// A head with every weight and bias set to zero. It maps any input to 0.
    pub fn zeros(device: Device) -> Result<Self, LoadError> {
        let candle_device = device.to_candle()?;
        let mut tensors = HashMap::with_capacity(LAYOUT.len() * 2);
        for &(index, input, output) in &LAYOUT {
            let weight = Tensor::zeros((output, input), DType::F32, &candle_device).map_err(
                |source| LoadError::Tensor {
                    name: weight_key(index),
                    source,
                },
            )?;
            let bias = Tensor::zeros(output, DType::F32, &candle_device).map_err(|source| {
                LoadError::Tensor {
                    name: bias_key(index),
                    source,
                }
            })?;
            tensors.insert(weight_key(index), weight);
            tensors.insert(bias_key(index), bias);
        }
        Self::from_tensors(tensors, device)
    }

    pub fn input_dim(&self) -> usize {
        LAYOUT[0].1
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Number of learned scalars across all layers.
    pub fn parameter_count(&self) -> usize {
        LAYOUT
            .iter()
            .map(|&(_, input, output)| input * output + output)
            .sum()
    }

    /// Score one embedding. The forward pass is deterministic.
    pub fn predict(&self, embedding: &[f32]) -> Result<f32, AestheticError> {
        let expected = self.input_dim();
        if embedding.len() != expected {
            return Err(AestheticError::Dimension {
                expected,
                actual: embedding.len(),
            });
        }

        let input = Tensor::from_slice(embedding, (1, expected), &self.candle_device)?;
        let output = self.forward(&input)?;
        let values = output.flatten_all()?.to_vec1::<f32>()?;
        match values.as_slice() {
            [score] => Ok(*score),
            other => Err(AestheticError::Inference(candle_core::Error::Msg(format!(
                "regressor produced {} outputs for one embedding",
                other.len()
            )))),
        }
    }

    /// Raw forward pass over a `(batch, 768)` tensor.
    pub fn forward(&self, input: &Tensor) -> candle_core::Result<Tensor> {
        self.layers
            .iter()
            .try_fold(input.clone(), |x, layer| layer.forward(&x))
    }
}

fn take_tensor(
    tensors: &mut HashMap<String, Tensor>,
    name: &str,
    expected: &[usize],
    device: &candle_core::Device,
) -> Result<Tensor, LoadError> {
    let tensor = tensors
        .remove(name)
        .ok_or_else(|| LoadError::MissingTensor(name.to_string()))?;

    if tensor.dims() != expected {
        return Err(LoadError::ShapeMismatch {
            name: name.to_string(),
            expected: expected.to_vec(),
            actual: tensor.dims().to_vec(),
        });
    }

    tensor
        .to_dtype(DType::F32)
        .and_then(|t| t.to_device(device))
        .map_err(|source| LoadError::Tensor {
            name: name.to_string(),
            source,
        })
}
