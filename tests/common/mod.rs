#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use aesthetic_score::regressor::{LAYOUT, bias_key, weight_key};
use candle_core::{DType, Device, Tensor};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Checkpoint tensors with a small deterministic ramp so outputs are nonzero.
pub fn ramp_tensors() -> HashMap<String, Tensor> {
    let device = Device::Cpu;
    let mut tensors = HashMap::new();
    for &(index, input, output) in &LAYOUT {
        let count = input * output;
        let values: Vec<f32> = (0..count)
            .map(|i| ((i % 97) as f32 - 48.0) * 1e-3)
            .collect();
        tensors.insert(
            weight_key(index),
            Tensor::from_vec(values, (output, input), &device).unwrap(),
        );
        let bias: Vec<f32> = (0..output).map(|i| (i % 5) as f32 * 1e-2).collect();
        tensors.insert(
            bias_key(index),
            Tensor::from_vec(bias, output, &device).unwrap(),
        );
    }
    tensors
}

pub fn zero_tensors() -> HashMap<String, Tensor> {
    let device = Device::Cpu;
    let mut tensors = HashMap::new();
    for &(index, input, output) in &LAYOUT {
        tensors.insert(
            weight_key(index),
            Tensor::zeros((output, input), DType::F32, &device).unwrap(),
        );
        tensors.insert(
            bias_key(index),
            Tensor::zeros(output, DType::F32, &device).unwrap(),
        );
    }
    tensors
}

pub fn write_checkpoint(dir: &Path, name: &str, tensors: &HashMap<String, Tensor>) -> PathBuf {
    let path = dir.join(name);
    candle_core::safetensors::save(tensors, &path).unwrap();
    path
}

pub fn gradient_image(width: u32, height: u32, seed: u8) -> DynamicImage {
    let mut img = RgbImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = Rgb([
            (x as u8).wrapping_mul(3).wrapping_add(seed),
            (y as u8).wrapping_mul(5),
            ((x + y) as u8).wrapping_add(seed.wrapping_mul(7)),
        ]);
    }
    DynamicImage::ImageRgb8(img)
}

pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}
