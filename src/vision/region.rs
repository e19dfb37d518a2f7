//! Coin region extraction
//!
//! Crops a padded square window around a detected coin, clamped to the image.

use image::{DynamicImage, GenericImageView};

use super::detection::DetectedRegion;
use super::VisionError;

/// Pixel bounds of a crop: `[x1, x2) × [y1, y2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBounds {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropBounds {
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// Window of half-size `radius + floor(radius * padding_ratio)` around the
/// center, clamped to `width × height`. `None` when nothing of it lies
/// inside the image.
pub fn crop_bounds(
    region: &DetectedRegion,
    padding_ratio: f32,
    width: u32,
    height: u32,
) -> Option<CropBounds> {
    let radius = region.radius as i64;
    let padding = (region.radius as f32 * padding_ratio).floor() as i64;
    let half = radius + padding;

    let x1 = (region.center_x as i64 - half).clamp(0, width as i64) as u32;
    let y1 = (region.center_y as i64 - half).clamp(0, height as i64) as u32;
    let x2 = (region.center_x as i64 + half).clamp(0, width as i64) as u32;
    let y2 = (region.center_y as i64 + half).clamp(0, height as i64) as u32;

    if x2 <= x1 || y2 <= y1 {
        return None;
    }

    Some(CropBounds { x1, y1, x2, y2 })
}

/// Extract the sub-image around a detected coin. Near the borders the crop
/// is simply smaller; no synthetic pixels are added.
pub fn extract_coin_region(
    image: &DynamicImage,
    region: &DetectedRegion,
    padding_ratio: f32,
) -> Result<DynamicImage, VisionError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(VisionError::EmptyImage);
    }

    let bounds = crop_bounds(region, padding_ratio, width, height).ok_or(
        VisionError::RegionOutOfBounds {
            x: region.center_x,
            y: region.center_y,
            radius: region.radius,
            width,
            height,
        },
    )?;

    Ok(image.crop_imm(bounds.x1, bounds.y1, bounds.width(), bounds.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn region(x: u32, y: u32, r: u32) -> DetectedRegion {
        DetectedRegion {
            center_x: x,
            center_y: y,
            radius: r,
        }
    }

    #[test]
    fn test_padded_crop_in_middle() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(500, 500, Luma([10u8])));
        let crop = extract_coin_region(&img, &region(250, 250, 100), 0.2).unwrap();
        // 100 + 20 on each side
        assert_eq!(crop.dimensions(), (240, 240));
    }

    #[test]
    fn test_padding_is_floored() {
        let bounds = crop_bounds(&region(200, 200, 57), 0.2, 1000, 1000).unwrap();
        // floor(57 * 0.2) = 11
        assert_eq!(bounds.x1, 200 - 57 - 11);
        assert_eq!(bounds.x2, 200 + 57 + 11);
    }

    #[test]
    fn test_crop_clamped_at_edges() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(300, 200));
        let crop = extract_coin_region(&img, &region(20, 190, 60), 0.2).unwrap();
        let (w, h) = crop.dimensions();
        // x: [0, 92), y: [118, 200)
        assert_eq!(w, 92);
        assert_eq!(h, 82);
    }

    #[test]
    fn test_empty_source_fails() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        let result = extract_coin_region(&img, &region(10, 10, 60), 0.2);
        assert!(matches!(result, Err(VisionError::EmptyImage)));
    }
}
