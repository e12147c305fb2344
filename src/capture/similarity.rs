//! Structural similarity scoring for neighboring captures
//!
//! Two consecutive near-identical frames mean the viewer has stopped turning
//! pages. Frames are compared as grayscale; when dimensions drift (viewer
//! chrome toggling, resolution change) only the newer frame is rescaled.

use std::borrow::Cow;

use anyhow::{ensure, Result};
use screenshots::image::imageops::{self, FilterType};
use screenshots::image::{GrayImage, RgbaImage};

use super::SimilarityScorer;

/// Window side for local statistics, clamped to the image's smaller side.
const DEFAULT_WINDOW: u32 = 7;

// Stabilizing constants from the SSIM paper, for 8-bit dynamic range
const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// Convert a captured frame to grayscale for comparison.
pub fn to_grayscale(frame: &RgbaImage) -> GrayImage {
    imageops::grayscale(frame)
}

/// Bring `candidate` to the reference's dimensions.
///
/// Only the newer image is ever rescaled; the reference keeps its size for
/// the whole comparison. Equal dimensions pass through untouched.
pub fn match_dimensions<'a>(
    reference: &GrayImage,
    candidate: &'a GrayImage,
) -> Cow<'a, GrayImage> {
    if reference.dimensions() == candidate.dimensions() {
        Cow::Borrowed(candidate)
    } else {
        let (width, height) = reference.dimensions();
        Cow::Owned(imageops::resize(
            candidate,
            width,
            height,
            FilterType::Triangle,
        ))
    }
}

/// Mean structural similarity (SSIM) over sliding uniform windows.
#[derive(Debug, Clone)]
pub struct Ssim {
    window: u32,
}

impl Ssim {
    pub fn new() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }

    pub fn with_window(window: u32) -> Self {
        Self {
            window: window.max(1),
        }
    }
}

impl Default for Ssim {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarityScorer for Ssim {
    fn score(&self, reference: &GrayImage, candidate: &GrayImage) -> Result<f64> {
        ensure!(
            reference.dimensions() == candidate.dimensions(),
            "image dimensions differ: {:?} vs {:?}",
            reference.dimensions(),
            candidate.dimensions()
        );
        let (width, height) = reference.dimensions();
        ensure!(width > 0 && height > 0, "cannot compare empty images");

        Ok(mean_ssim(
            reference.as_raw(),
            candidate.as_raw(),
            width as usize,
            height as usize,
            self.window,
        ))
    }
}

fn mean_ssim(a: &[u8], b: &[u8], width: usize, height: usize, window: u32) -> f64 {
    let win = (window as usize).min(width).min(height);
    let stride = width + 1;

    // Summed-area tables (zero-padded by one row/column) for the per-window
    // means, variances and covariance
    let mut sum_a = vec![0.0f64; stride * (height + 1)];
    let mut sum_b = vec![0.0f64; stride * (height + 1)];
    let mut sum_aa = vec![0.0f64; stride * (height + 1)];
    let mut sum_bb = vec![0.0f64; stride * (height + 1)];
    let mut sum_ab = vec![0.0f64; stride * (height + 1)];

    for y in 0..height {
        for x in 0..width {
            let pa = a[y * width + x] as f64;
            let pb = b[y * width + x] as f64;
            let idx = (y + 1) * stride + (x + 1);
            let up = y * stride + (x + 1);
            let left = idx - 1;
            let diag = up - 1;

            sum_a[idx] = pa + sum_a[up] + sum_a[left] - sum_a[diag];
            sum_b[idx] = pb + sum_b[up] + sum_b[left] - sum_b[diag];
            sum_aa[idx] = pa * pa + sum_aa[up] + sum_aa[left] - sum_aa[diag];
            sum_bb[idx] = pb * pb + sum_bb[up] + sum_bb[left] - sum_bb[diag];
            sum_ab[idx] = pa * pb + sum_ab[up] + sum_ab[left] - sum_ab[diag];
        }
    }

    let n = (win * win) as f64;
    let mut total = 0.0;
    let mut windows = 0usize;

    for y0 in 0..=(height - win) {
        for x0 in 0..=(width - win) {
            let mean_a = rect_sum(&sum_a, stride, x0, y0, win) / n;
            let mean_b = rect_sum(&sum_b, stride, x0, y0, win) / n;
            let var_a = rect_sum(&sum_aa, stride, x0, y0, win) / n - mean_a * mean_a;
            let var_b = rect_sum(&sum_bb, stride, x0, y0, win) / n - mean_b * mean_b;
            let covar = rect_sum(&sum_ab, stride, x0, y0, win) / n - mean_a * mean_b;

            let numerator = (2.0 * mean_a * mean_b + C1) * (2.0 * covar + C2);
            let denominator =
                (mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2);

            total += numerator / denominator;
            windows += 1;
        }
    }

    // SSIM can go slightly negative on anticorrelated windows; the scorer
    // contract is [0, 1]
    (total / windows as f64).clamp(0.0, 1.0)
}

fn rect_sum(table: &[f64], stride: usize, x0: usize, y0: usize, win: usize) -> f64 {
    let (x1, y1) = (x0 + win, y0 + win);
    table[y1 * stride + x1] - table[y0 * stride + x1] - table[y1 * stride + x0]
        + table[y0 * stride + x0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenshots::image::Luma;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 13) % 251) as u8]))
    }

    #[test]
    fn test_identical_images_score_one() {
        let img = gradient(16, 16);
        let score = Ssim::new().score(&img, &img).unwrap();
        assert!((1.0 - score).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_opposite_images_score_low() {
        let black = GrayImage::from_pixel(16, 16, Luma([0]));
        let white = GrayImage::from_pixel(16, 16, Luma([255]));
        let score = Ssim::new().score(&black, &white).unwrap();
        assert!(score < 0.05, "score was {score}");
    }

    #[test]
    fn test_score_stays_in_unit_range() {
        let a = gradient(16, 16);
        let b = GrayImage::from_fn(16, 16, |x, y| Luma([((y * 17 + x * 3) % 256) as u8]));
        let score = Ssim::new().score(&a, &b).unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let a = gradient(16, 16);
        let b = gradient(8, 16);
        assert!(Ssim::new().score(&a, &b).is_err());
    }

    #[test]
    fn test_window_clamped_to_small_images() {
        let img = gradient(3, 3);
        let score = Ssim::new().score(&img, &img).unwrap();
        assert!((1.0 - score).abs() < 1e-9);
    }

    #[test]
    fn test_match_dimensions_passthrough_when_equal() {
        let reference = gradient(16, 16);
        let candidate = gradient(16, 16);
        let matched = match_dimensions(&reference, &candidate);
        assert!(matches!(matched, Cow::Borrowed(_)));
    }

    #[test]
    fn test_match_dimensions_resizes_candidate_only() {
        let reference = gradient(16, 16);
        let candidate = gradient(32, 24);
        let matched = match_dimensions(&reference, &candidate);
        assert!(matches!(matched, Cow::Owned(_)));
        assert_eq!(matched.dimensions(), (16, 16));
        // The inputs themselves are untouched
        assert_eq!(reference.dimensions(), (16, 16));
        assert_eq!(candidate.dimensions(), (32, 24));
    }

    #[test]
    fn test_resize_is_a_noop_for_equal_dimensions() {
        let a = gradient(16, 16);
        let b = GrayImage::from_fn(16, 16, |x, y| Luma([((x + y * 5) % 200) as u8]));
        let scorer = Ssim::new();
        let direct = scorer.score(&a, &b).unwrap();
        let via_resize = scorer.score(&a, &match_dimensions(&a, &b)).unwrap();
        assert_eq!(direct, via_resize);
    }
}
