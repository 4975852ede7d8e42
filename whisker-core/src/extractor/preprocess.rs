//! Image decoding and canonical model input.
//!
//! Every backend receives the same tensor: RGB, bilinear-resized to
//! 224×224, normalized with the ImageNet channel statistics, laid out CHW.

use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::{Result, WhiskerError};

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 224;

/// Number of `f32` values in one preprocessed image (`3 × 224 × 224`).
pub const TENSOR_LEN: usize = 3 * (INPUT_SIZE as usize) * (INPUT_SIZE as usize);

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decode raw image bytes (JPEG, PNG, GIF, or WebP).
pub fn decode(image_data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(image_data)
        .map_err(|e| WhiskerError::ImageDecode(format!("Failed to decode image: {}", e)))
}

/// Check if the provided bytes appear to be a supported image format.
pub fn is_supported_format(data: &[u8]) -> bool {
    image::guess_format(data).is_ok()
}

/// Convert an image into the canonical CHW input tensor.
pub fn preprocess(image: &DynamicImage) -> Vec<f32> {
    let rgb = image
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut tensor = vec![0.0f32; TENSOR_LEN];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            tensor[c * plane + i] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    tensor
}
