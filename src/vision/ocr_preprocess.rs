//! Image preprocessing filters for OCR passes
//!
//! Coin dates are small, low contrast and vary in polarity, so each OCR pass
//! binarizes the (upscaled) coin differently before recognition.

use image::imageops::FilterType;
use image::{GrayImage, Luma};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

/// Upscale a grayscale image by an integer factor using cubic interpolation
pub fn upscale(image: &GrayImage, factor: u32) -> GrayImage {
    if factor <= 1 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    image::imageops::resize(image, width * factor, height * factor, FilterType::CatmullRom)
}

/// Global Otsu binarization. Pixels above the level become white, unless
/// `invert` is set (dark coin, light digits).
pub fn otsu_binarize(image: &GrayImage, invert: bool) -> GrayImage {
    let level = otsu_level(image);
    debug!("Otsu level {} (invert={})", level, invert);

    let kind = if invert {
        ThresholdType::BinaryInverted
    } else {
        ThresholdType::Binary
    };
    threshold(image, level, kind)
}

/// Adaptive threshold against a Gaussian-weighted local mean.
///
/// A pixel is white when it is brighter than `local_mean - offset`. The
/// Gaussian window follows `block_size` the same way OpenCV derives sigma
/// from an aperture.
pub fn adaptive_gaussian_threshold(image: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let block = block_size.max(3) as f32;
    let sigma = 0.3 * ((block - 1.0) * 0.5 - 1.0) + 0.8;
    let local_mean = gaussian_blur_f32(image, sigma);

    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let value = image.get_pixel(x, y).0[0] as i32;
        let cutoff = local_mean.get_pixel(x, y).0[0] as i32 - offset;
        if value > cutoff {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `grid × grid` arrangement of tiles; each tile
/// gets a clipped-histogram lookup table and pixels blend the tables of the
/// four nearest tile centers.
pub fn clahe(image: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let grid = grid.max(1);
    let tile_w = width.div_ceil(grid.min(width));
    let tile_h = height.div_ceil(grid.min(height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts[(ty * tiles_x + tx) as usize] = tile_lut(image, x0, y0, x1, y1, clip_limit);
        }
    }

    let lut_at = |tx: u32, ty: u32, v: u8| luts[(ty * tiles_x + tx) as usize][v as usize] as f32;

    GrayImage::from_fn(width, height, |x, y| {
        let v = image.get_pixel(x, y).0[0];

        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = (fx.floor().max(0.0) as u32).min(tiles_x - 1);
        let ty0 = (fy.floor().max(0.0) as u32).min(tiles_y - 1);
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let ax = (fx - tx0 as f32).clamp(0.0, 1.0);
        let ay = (fy - ty0 as f32).clamp(0.0, 1.0);

        let top = lut_at(tx0, ty0, v) * (1.0 - ax) + lut_at(tx1, ty0, v) * ax;
        let bottom = lut_at(tx0, ty1, v) * (1.0 - ax) + lut_at(tx1, ty1, v) * ax;
        let value = top * (1.0 - ay) + bottom * ay;

        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// Equalization table for one tile with the histogram clipped at
/// `clip_limit × mean bin height` and the excess spread evenly
fn tile_lut(image: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut histogram = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            histogram[image.get_pixel(x, y).0[0] as usize] += 1;
        }
    }

    let area = (x1 - x0) * (y1 - y0);
    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }

    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in histogram.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }

        let share = excess / 256;
        let remainder = (excess % 256) as usize;
        for (i, bin) in histogram.iter_mut().enumerate() {
            *bin += share + u32::from(i < remainder);
        }
    }

    let scale = 255.0 / area as f32;
    let mut cumulative = 0u32;
    for (i, &count) in histogram.iter().enumerate() {
        cumulative += count;
        lut[i] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }

    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([(x * 255 / (width - 1)) as u8]))
    }

    #[test]
    fn test_upscale_3x() {
        let img = gradient(10, 6);
        let up = upscale(&img, 3);
        assert_eq!(up.dimensions(), (30, 18));
    }

    #[test]
    fn test_upscale_noop() {
        let img = gradient(4, 4);
        assert_eq!(upscale(&img, 1), img);
    }

    #[test]
    fn test_otsu_binarize_two_levels() {
        let img = GrayImage::from_fn(8, 1, |x, _| Luma([if x < 4 { 40 } else { 200 }]));

        let binary = otsu_binarize(&img, false);
        assert_eq!(binary.get_pixel(0, 0).0[0], 0);
        assert_eq!(binary.get_pixel(7, 0).0[0], 255);

        let inverted = otsu_binarize(&img, true);
        assert_eq!(inverted.get_pixel(0, 0).0[0], 255);
        assert_eq!(inverted.get_pixel(7, 0).0[0], 0);
    }

    #[test]
    fn test_adaptive_threshold_is_binary() {
        let img = gradient(40, 20);
        let out = adaptive_gaussian_threshold(&img, 11, 2);
        assert_eq!(out.dimensions(), img.dimensions());
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_adaptive_threshold_flat_image_is_white() {
        // value > mean - offset everywhere
        let img = GrayImage::from_pixel(16, 16, Luma([90u8]));
        let out = adaptive_gaussian_threshold(&img, 11, 2);
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_clahe_preserves_dimensions() {
        let img = gradient(50, 30);
        let out = clahe(&img, 2.0, 8);
        assert_eq!(out.dimensions(), (50, 30));
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        let img = GrayImage::from_fn(64, 64, |x, _| Luma([100 + (x % 8) as u8]));
        let out = clahe(&img, 2.0, 8);

        let min = out.pixels().map(|p| p.0[0]).min().unwrap();
        let max = out.pixels().map(|p| p.0[0]).max().unwrap();
        assert!(max - min > 7, "contrast should grow: {}..{}", min, max);
    }

    #[test]
    fn test_clahe_tiny_image() {
        let img = GrayImage::from_pixel(3, 2, Luma([50u8]));
        let out = clahe(&img, 2.0, 8);
        assert_eq!(out.dimensions(), (3, 2));
    }
}
