use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use super::PixelTensor;
use crate::error::EmbeddingError;

/// Per-channel RGB mean used when CLIP was trained.
pub const CLIP_IMAGE_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
/// Per-channel RGB standard deviation used when CLIP was trained.
pub const CLIP_IMAGE_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// CLIP's image transform: shortest side to `size` (bicubic), center crop to
/// `size`², RGB, scale to `[0, 1]`, per-channel standardize, NCHW with batch 1.
///
/// The centered square is cut from the source before resampling, so the only
/// buffers allocated are bounded by the source image and `size`², whatever the
/// aspect ratio.
pub fn clip_preprocess(image: &DynamicImage, size: u32) -> Result<PixelTensor, EmbeddingError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || size == 0 {
        return Err(EmbeddingError::EmptyImage);
    }

    let (left, top, side) = center_square(width, height);
    let rgb = image
        .crop_imm(left, top, side, side)
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8();

    let side = size as usize;
    let plane = side * side;
    let mut data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let idx = y as usize * side + x as usize;
        for channel in 0..3 {
            let value = f32::from(pixel[channel]) / 255.0;
            data[channel * plane + idx] =
                (value - CLIP_IMAGE_MEAN[channel]) / CLIP_IMAGE_STD[channel];
        }
    }

    PixelTensor::new([1, 3, side, side], data)
}

/// Largest centered square in a `width` x `height` image as
/// `(left, top, side)`. Odd leftovers round toward the far edge.
fn center_square(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    (
        centered_offset(width, side),
        centered_offset(height, side),
        side,
    )
}

fn centered_offset(extent: u32, size: u32) -> u32 {
    ((extent - size) as f32 / 2.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn output_is_nchw_at_requested_size() {
        let tensor = clip_preprocess(&solid(320, 240, [10, 20, 30]), 224).unwrap();
        assert_eq!(tensor.shape(), [1, 3, 224, 224]);
        assert_eq!(tensor.data().len(), 3 * 224 * 224);
    }

    #[test]
    fn center_square_of_source() {
        assert_eq!(center_square(640, 480), (80, 0, 480));
        assert_eq!(center_square(480, 640), (0, 80, 480));
        assert_eq!(center_square(100, 100), (0, 0, 100));
        assert_eq!(center_square(1, 4000), (0, 2000, 1));
    }

    #[test]
    fn extreme_aspect_ratio_stays_bounded() {
        let strip = solid(1, 4000, [40, 80, 120]);
        let tensor = clip_preprocess(&strip, 224).unwrap();
        assert_eq!(tensor.shape(), [1, 3, 224, 224]);
        assert_eq!(tensor.data().len(), 3 * 224 * 224);

        let expected = (40.0 / 255.0 - CLIP_IMAGE_MEAN[0]) / CLIP_IMAGE_STD[0];
        assert!((tensor.data()[0] - expected).abs() < 1e-4);
    }

    #[test]
    fn crop_keeps_the_center_of_a_wide_image() {
        // Left and right thirds are black, the middle third white.
        let img = RgbImage::from_fn(90, 30, |x, _| {
            if (30..60).contains(&x) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let tensor = clip_preprocess(&DynamicImage::ImageRgb8(img), 30).unwrap();
        let white = (1.0 - CLIP_IMAGE_MEAN[0]) / CLIP_IMAGE_STD[0];
        assert!(tensor.data()[..30 * 30].iter().all(|v| (v - white).abs() < 1e-4));
    }

    #[test]
    fn center_crop_offset_rounds() {
        assert_eq!(centered_offset(298, 224), 37);
        assert_eq!(centered_offset(641, 480), 81);
        assert_eq!(centered_offset(225, 224), 1);
        assert_eq!(centered_offset(224, 224), 0);
    }

    #[test]
    fn solid_color_is_standardized_per_channel() {
        let tensor = clip_preprocess(&solid(32, 32, [255, 0, 128]), 32).unwrap();
        let plane = 32 * 32;
        let data = tensor.data();

        let red = (1.0 - CLIP_IMAGE_MEAN[0]) / CLIP_IMAGE_STD[0];
        let green = (0.0 - CLIP_IMAGE_MEAN[1]) / CLIP_IMAGE_STD[1];
        let blue = (128.0 / 255.0 - CLIP_IMAGE_MEAN[2]) / CLIP_IMAGE_STD[2];

        assert!(data[..plane].iter().all(|v| (v - red).abs() < 1e-4));
        assert!(data[plane..2 * plane].iter().all(|v| (v - green).abs() < 1e-4));
        assert!(data[2 * plane..].iter().all(|v| (v - blue).abs() < 1e-4));
    }

    #[test]
    fn grayscale_input_is_expanded_to_rgb() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(40, 40, image::Luma([200])));
        let tensor = clip_preprocess(&gray, 16).unwrap();
        assert_eq!(tensor.shape(), [1, 3, 16, 16]);
    }

    #[test]
    fn empty_image_is_rejected() {
        let empty = DynamicImage::new_rgb8(0, 10);
        assert!(matches!(
            clip_preprocess(&empty, 224),
            Err(EmbeddingError::EmptyImage)
        ));
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let mut img = RgbImage::new(50, 30);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 5) as u8, (y * 8) as u8, ((x + y) * 3) as u8]);
        }
        let img = DynamicImage::ImageRgb8(img);
        let a = clip_preprocess(&img, 24).unwrap();
        let b = clip_preprocess(&img, 24).unwrap();
        assert_eq!(a, b);
    }
}
