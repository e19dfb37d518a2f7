//! Coin region detection
//!
//! Circle Hough transform, gradient variant. Edge pixels vote along their
//! gradient direction for candidate centers; every center that survives
//! non-maximum suppression then picks the radius best supported by the edge
//! pixels around it.

use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::DetectionSettings;

/// A candidate coin in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectedRegion {
    pub center_x: u32,
    pub center_y: u32,
    pub radius: u32,
}

/// Edge pixel with its unit gradient direction
#[derive(Debug, Clone, Copy)]
struct EdgePoint {
    x: f32,
    y: f32,
    dx: f32,
    dy: f32,
}

/// Center vote accumulator, one cell per `accumulator_resolution` pixels
struct Accumulator {
    width: usize,
    height: usize,
    votes: Vec<u32>,
}

impl Accumulator {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            votes: vec![0; width * height],
        }
    }

    fn get(&self, x: usize, y: usize) -> u32 {
        self.votes[y * self.width + x]
    }
}

/// Center candidate in accumulator coordinates
#[derive(Debug, Clone, Copy)]
struct CenterCandidate {
    x: usize,
    y: usize,
    votes: u32,
}

/// Finds near-circular coin outlines in a photograph
pub struct RegionDetector {
    config: DetectionSettings,
}

impl RegionDetector {
    /// Create a detector with default settings
    pub fn new() -> Self {
        Self::with_config(DetectionSettings::default())
    }

    /// Create a detector with custom settings
    pub fn with_config(config: DetectionSettings) -> Self {
        Self { config }
    }

    /// Detect coin regions in a color or grayscale image
    pub fn detect(&self, image: &DynamicImage) -> Vec<DetectedRegion> {
        self.detect_gray(&image.to_luma8())
    }

    /// Detect coin regions in a grayscale image.
    ///
    /// Regions come back strongest first, at most `max_regions` of them, each
    /// with a radius inside `[min_radius, max_radius]`. An image without any
    /// circle yields an empty list.
    pub fn detect_gray(&self, gray: &GrayImage) -> Vec<DetectedRegion> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return vec![];
        }

        let start = Instant::now();

        let blurred = if self.config.blur_sigma > 0.0 {
            gaussian_blur_f32(gray, self.config.blur_sigma)
        } else {
            gray.clone()
        };

        let points = self.edge_points(&blurred);
        let accumulator = self.vote(&points, width, height);
        let centers = self.find_centers(&accumulator);

        debug!(
            "Circle voting: {} edge points, {} center candidates",
            points.len(),
            centers.len()
        );

        let mut regions = self.resolve_circles(&centers, &points);
        regions.truncate(self.config.max_regions);
        regions.retain(|r| r.radius >= self.config.min_radius && r.radius <= self.config.max_radius);

        info!(
            "Detected {} coin regions in {}x{} image ({:?})",
            regions.len(),
            width,
            height,
            start.elapsed()
        );

        regions
    }

    /// Canny edges paired with their Sobel gradient direction
    fn edge_points(&self, blurred: &GrayImage) -> Vec<EdgePoint> {
        let high = self.config.edge_threshold;
        let edges = canny(blurred, high / 2.0, high);
        let gx = horizontal_sobel(blurred);
        let gy = vertical_sobel(blurred);

        let mut points = Vec::new();
        for (x, y, pixel) in edges.enumerate_pixels() {
            if pixel.0[0] == 0 {
                continue;
            }
            let dx = gx.get_pixel(x, y).0[0] as f32;
            let dy = gy.get_pixel(x, y).0[0] as f32;
            let magnitude = (dx * dx + dy * dy).sqrt();
            if magnitude < 1.0 {
                continue;
            }
            points.push(EdgePoint {
                x: x as f32,
                y: y as f32,
                dx: dx / magnitude,
                dy: dy / magnitude,
            });
        }

        points
    }

    /// Every edge point votes along its gradient line, both directions, for
    /// centers between `min_radius` and `max_radius` away
    fn vote(&self, points: &[EdgePoint], width: u32, height: u32) -> Accumulator {
        let dp = self.config.accumulator_resolution.max(1.0);
        let acc_w = (width as f32 / dp).ceil() as usize + 2;
        let acc_h = (height as f32 / dp).ceil() as usize + 2;
        let mut acc = Accumulator::new(acc_w, acc_h);

        let min_steps = (self.config.min_radius as f32 / dp).ceil() as i32;
        let max_steps = (self.config.max_radius as f32 / dp).floor() as i32;

        for p in points {
            let (x0, y0) = (p.x / dp, p.y / dp);
            for sign in [1.0f32, -1.0] {
                let (sx, sy) = (p.dx * sign, p.dy * sign);
                for k in min_steps..=max_steps {
                    let cx = x0 + sx * k as f32;
                    let cy = y0 + sy * k as f32;
                    if cx < 0.0 || cy < 0.0 || cx >= acc_w as f32 || cy >= acc_h as f32 {
                        break;
                    }
                    acc.votes[cy as usize * acc_w + cx as usize] += 1;
                }
            }
        }

        acc
    }

    /// Local maxima above the accumulator threshold, strongest first
    fn find_centers(&self, acc: &Accumulator) -> Vec<CenterCandidate> {
        let threshold = self.config.accumulator_threshold;
        let mut centers = Vec::new();

        for y in 1..acc.height.saturating_sub(1) {
            for x in 1..acc.width.saturating_sub(1) {
                let v = acc.get(x, y);
                if v > threshold
                    && v > acc.get(x - 1, y)
                    && v >= acc.get(x + 1, y)
                    && v > acc.get(x, y - 1)
                    && v >= acc.get(x, y + 1)
                {
                    centers.push(CenterCandidate { x, y, votes: v });
                }
            }
        }

        centers.sort_by(|a, b| b.votes.cmp(&a.votes));
        centers
    }

    /// Turn center candidates into circles, enforcing the minimum center
    /// distance and requiring enough edge support at the chosen radius
    fn resolve_circles(&self, centers: &[CenterCandidate], points: &[EdgePoint]) -> Vec<DetectedRegion> {
        let dp = self.config.accumulator_resolution.max(1.0);
        let min_dist_sq = self.config.min_center_distance * self.config.min_center_distance;
        let mut accepted: Vec<(f32, f32)> = Vec::new();
        let mut regions = Vec::new();

        for center in centers {
            if regions.len() >= self.config.max_regions {
                break;
            }

            let cx = (center.x as f32 + 0.5) * dp;
            let cy = (center.y as f32 + 0.5) * dp;

            let too_close = accepted
                .iter()
                .any(|&(ax, ay)| (ax - cx).powi(2) + (ay - cy).powi(2) < min_dist_sq);
            if too_close {
                continue;
            }

            let Some((radius, support)) = self.best_radius(cx, cy, points) else {
                continue;
            };
            if support <= self.config.accumulator_threshold {
                continue;
            }

            accepted.push((cx, cy));
            regions.push(DetectedRegion {
                center_x: cx.round().max(0.0) as u32,
                center_y: cy.round().max(0.0) as u32,
                radius,
            });
        }

        regions
    }

    /// Radius with the most edge points within one pixel of it
    fn best_radius(&self, cx: f32, cy: f32, points: &[EdgePoint]) -> Option<(u32, u32)> {
        let min_r = self.config.min_radius as usize;
        let max_r = self.config.max_radius as usize;
        if max_r < min_r {
            return None;
        }

        let mut histogram = vec![0u32; max_r + 2];
        for p in points {
            let d = ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt();
            let bin = d.round() as usize;
            if bin >= min_r && bin <= max_r {
                histogram[bin] += 1;
            }
        }

        let mut best: Option<(u32, u32)> = None;
        for r in min_r..=max_r {
            let support = histogram[r.saturating_sub(1)] + histogram[r] + histogram[r + 1];
            if best.map_or(true, |(_, s)| support > s) {
                best = Some((r as u32, support));
            }
        }

        best.filter(|&(_, support)| support > 0)
    }
}

impl Default for RegionDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_circle_mut;

    fn disc_image(width: u32, height: u32, discs: &[(i32, i32, i32)]) -> GrayImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([0u8]));
        for &(x, y, r) in discs {
            draw_filled_circle_mut(&mut img, (x, y), r, Luma([255u8]));
        }
        img
    }

    #[test]
    fn test_blank_image_has_no_regions() {
        let img = GrayImage::from_pixel(320, 240, Luma([128u8]));
        let regions = RegionDetector::new().detect_gray(&img);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_empty_image_has_no_regions() {
        let img = GrayImage::new(0, 0);
        assert!(RegionDetector::new().detect_gray(&img).is_empty());
    }

    #[test]
    fn test_single_disc_detected() {
        let img = disc_image(400, 400, &[(200, 200, 80)]);
        let regions = RegionDetector::new().detect_gray(&img);

        assert!(!regions.is_empty(), "Disc should be detected");
        let best = regions[0];
        assert!((best.center_x as i32 - 200).abs() <= 4, "center_x: {}", best.center_x);
        assert!((best.center_y as i32 - 200).abs() <= 4, "center_y: {}", best.center_y);
        assert!((best.radius as i32 - 80).abs() <= 4, "radius: {}", best.radius);
    }

    #[test]
    fn test_radius_bounds_enforced() {
        let img = disc_image(400, 400, &[(100, 100, 20), (260, 260, 90)]);
        let detector = RegionDetector::new();
        let regions = detector.detect_gray(&img);

        for r in &regions {
            assert!(r.radius >= 50 && r.radius <= 300, "radius out of range: {:?}", r);
        }
    }

    #[test]
    fn test_region_count_capped() {
        let mut discs = Vec::new();
        for row in 0..3 {
            for col in 0..4 {
                discs.push((100 + col * 150, 100 + row * 150, 55));
            }
        }
        let img = disc_image(650, 500, &discs);
        let regions = RegionDetector::new().detect_gray(&img);

        assert!(!regions.is_empty());
        assert!(regions.len() <= 10, "too many regions: {}", regions.len());
    }

    #[test]
    fn test_custom_region_limit() {
        let img = disc_image(650, 300, &[(120, 150, 70), (320, 150, 70), (520, 150, 70)]);
        let config = DetectionSettings {
            max_regions: 1,
            ..Default::default()
        };
        let regions = RegionDetector::with_config(config).detect_gray(&img);
        assert!(regions.len() <= 1);
    }
}
