//! Image preprocessing for the CLIP visual encoder
//!
//! Handles resizing, center cropping, normalization and tensor conversion.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::{Array3, Array4};

/// Preprocessing configuration
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Side of the square model input
    pub input_size: u32,
    /// Mean values for normalization [R, G, B]
    pub mean: [f32; 3],
    /// Std values for normalization [R, G, B]
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            input_size: 224,
            // OpenAI CLIP statistics
            mean: [0.48145466, 0.4578275, 0.40821073],
            std: [0.26862954, 0.26130258, 0.27577711],
        }
    }
}

/// Resize so the shorter side equals `size` (bicubic), keeping aspect ratio
pub fn resize_shortest_side(image: &DynamicImage, size: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let scale = size as f32 / w.min(h).max(1) as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(size);
    let new_h = ((h as f32 * scale).round() as u32).max(size);

    image.resize_exact(new_w, new_h, FilterType::CatmullRom).to_rgb8()
}

/// Cut the centered `size × size` square out of an image at least that large
pub fn center_crop(image: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let size = size.min(w).min(h);
    let x = (w - size) / 2;
    let y = (h - size) / 2;
    image::imageops::crop_imm(image, x, y, size, size).to_image()
}

/// Convert an RGB image to an HWC f32 array in [0, 1]
pub fn rgb_to_f32(image: &RgbImage) -> Array3<f32> {
    let (w, h) = image.dimensions();
    Array3::<f32>::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
        image.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0
    })
}

/// Normalize image with mean and std
pub fn normalize(image: &Array3<f32>, mean: &[f32; 3], std: &[f32; 3]) -> Array3<f32> {
    let mut normalized = image.clone();
    for ((_, _, c), value) in normalized.indexed_iter_mut() {
        *value = (*value - mean[c]) / std[c];
    }
    normalized
}

/// Convert HWC image to NCHW tensor (batch size 1)
pub fn hwc_to_nchw(image: &Array3<f32>) -> Array4<f32> {
    let (h, w, c) = image.dim();
    let mut tensor = Array4::<f32>::zeros((1, c, h, w));

    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                tensor[[0, ch, y, x]] = image[[y, x, ch]];
            }
        }
    }

    tensor
}

/// Full preprocessing pipeline for the visual encoder
pub fn preprocess_for_clip(image: &DynamicImage, config: &PreprocessConfig) -> Array4<f32> {
    let resized = resize_shortest_side(image, config.input_size);
    let cropped = center_crop(&resized, config.input_size);
    let normalized = normalize(&rgb_to_f32(&cropped), &config.mean, &config.std);
    hwc_to_nchw(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_resize_shortest_side() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(400, 200));
        let resized = resize_shortest_side(&img, 224);
        assert_eq!(resized.dimensions(), (448, 224));
    }

    #[test]
    fn test_center_crop() {
        let img = RgbImage::from_fn(6, 4, |x, _| Rgb([x as u8, 0, 0]));
        let cropped = center_crop(&img, 4);
        assert_eq!(cropped.dimensions(), (4, 4));
        // Columns 1..5 survive
        assert_eq!(cropped.get_pixel(0, 0).0[0], 1);
    }

    #[test]
    fn test_hwc_to_nchw() {
        let hwc = Array3::<f32>::from_shape_fn((10, 20, 3), |(h, w, c)| {
            (h * 100 + w * 10 + c) as f32
        });

        let nchw = hwc_to_nchw(&hwc);

        assert_eq!(nchw.dim(), (1, 3, 10, 20));
        assert_eq!(nchw[[0, 1, 5, 10]], hwc[[5, 10, 1]]);
    }

    #[test]
    fn test_normalize() {
        let image = Array3::<f32>::from_elem((2, 2, 3), 0.5);
        let config = PreprocessConfig::default();

        let normalized = normalize(&image, &config.mean, &config.std);

        assert!((normalized[[0, 0, 0]] - (0.5 - 0.48145466) / 0.26862954).abs() < 1e-5);
        assert!((normalized[[1, 1, 2]] - (0.5 - 0.40821073) / 0.27577711).abs() < 1e-5);
    }

    #[test]
    fn test_clip_tensor_shape() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 500, Rgb([200, 180, 40])));
        let tensor = preprocess_for_clip(&img, &PreprocessConfig::default());
        assert_eq!(tensor.dim(), (1, 3, 224, 224));
    }
}
