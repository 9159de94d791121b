//! Compute placement shared by the regressor and the embedding backend.
//!
//! A [`Device`] is chosen once, at load time, and both halves of the model are
//! built on it. Nothing moves tensors between devices after construction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::LoadError;

/// Target device for inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    #[default]
    Cpu,
    /// CUDA device by ordinal.
    Cuda(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown device '{0}', expected \"cpu\", \"cuda\" or \"cuda:N\"")]
pub struct ParseDeviceError(String);

impl Device {
    /// Resolve the candle device used by the regression head.
    pub(crate) fn to_candle(self) -> Result<candle_core::Device, LoadError> {
        match self {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(ordinal) => candle_core::Device::new_cuda(ordinal)
                .map_err(|e| LoadError::Device(format!("{self}: {e}"))),
        }
    }
}

impl FromStr for Device {
    type Err = ParseDeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|ordinal| ordinal.parse::<usize>().ok())
                .map(Device::Cuda)
                .ok_or_else(|| ParseDeviceError(s.to_string())),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
        }
    }
}

impl TryFrom<String> for Device {
    type Error = ParseDeviceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(value: Device) -> Self {
        value.to_string()
    }
}
