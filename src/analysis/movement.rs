// src/analysis/movement.rs
//
// Temporal movement estimation from consecutive normalized frames.
//
// Pipeline per frame pair:
//   absdiff → gaussian blur → adaptive threshold → open → close → count
//
// Everything here operates on plain grayscale buffers, no vision library
// involved. The estimator owns a private copy of the previous frame and
// nothing else; scoring a pair is a pure function.

use super::frame::GrayFrame;
use crate::types::MovementConfig;
use serde::Serialize;
use tracing::debug;

/// Movement measured between one consecutive frame pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MovementSample {
    /// Changed-pixel count with super-linear emphasis for widespread motion
    pub score: u64,
    /// Fraction of the frame that changed, 0-100
    pub percentage: f64,
    /// Raw count of pixels classified as changed
    pub changed_pixels: u64,
}

impl MovementSample {
    pub fn none() -> Self {
        Self {
            score: 0,
            percentage: 0.0,
            changed_pixels: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Border {
    /// gfedcb|abcdefgh|gfedcba
    Reflect101,
    /// aaaaaa|abcdefgh|hhhhhhh
    Replicate,
}

pub struct MovementEstimator {
    config: MovementConfig,
    prev_frame: Option<GrayFrame>,
}

impl MovementEstimator {
    pub fn new(config: MovementConfig) -> Self {
        Self {
            config,
            prev_frame: None,
        }
    }

    /// Score `frame` against the stored previous frame without touching state.
    ///
    /// Returns None before the first frame has been remembered, and when the
    /// shapes differ (no movement signal for that pair).
    pub fn measure(&self, frame: &GrayFrame) -> Option<MovementSample> {
        let prev = self.prev_frame.as_ref()?;
        if !prev.same_shape(frame) {
            debug!(
                "Frame shape changed {}x{} → {}x{}, skipping movement",
                prev.width, prev.height, frame.width, frame.height
            );
            return None;
        }
        Some(movement_between(prev, frame, &self.config))
    }

    /// Store a private copy of `frame` as the reference for the next pair.
    pub fn remember(&mut self, frame: &GrayFrame) {
        match &mut self.prev_frame {
            Some(prev) if prev.same_shape(frame) => prev.data.copy_from_slice(&frame.data),
            slot => *slot = Some(frame.clone()),
        }
    }

    pub fn reset(&mut self) {
        self.prev_frame = None;
    }
}

/// Score the movement between two frames of identical shape.
pub fn movement_between(prev: &GrayFrame, curr: &GrayFrame, config: &MovementConfig) -> MovementSample {
    let total_pixels = curr.pixel_count();
    if total_pixels == 0 {
        return MovementSample::none();
    }

    let diff = prev.zip_map(curr, |a, b| a.abs_diff(b));
    let blurred = gaussian_blur(&diff, config.blur_kernel);
    let mask = adaptive_threshold(&blurred, config.threshold_block_size, config.threshold_offset);

    let mask = dilate(&erode(&mask, config.morph_kernel), config.morph_kernel);
    let mask = erode(&dilate(&mask, config.morph_kernel), config.morph_kernel);

    let changed_pixels = mask.data.iter().filter(|&&p| p > 0).count() as u64;
    let percentage = 100.0 * changed_pixels as f64 / total_pixels as f64;
    let score = (changed_pixels as f64 * (1.0 + percentage / 100.0)).floor() as u64;

    MovementSample {
        score,
        percentage,
        changed_pixels,
    }
}

/// Gaussian blur with sigma derived from the kernel size.
fn gaussian_blur(frame: &GrayFrame, ksize: usize) -> GrayFrame {
    let kernel = gaussian_kernel(ksize);
    let input: Vec<f32> = frame.data.iter().map(|&p| p as f32).collect();
    let out = convolve_separable(&input, frame.width, frame.height, &kernel, Border::Reflect101);
    let data = out.iter().map(|v| v.round().clamp(0.0, 255.0) as u8).collect();
    GrayFrame::new(data, frame.width, frame.height)
}

/// Binarize "changed" vs "unchanged" against a gaussian-weighted local mean.
///
/// A pixel is on when it exceeds its neighbourhood mean minus `offset` and
/// also exceeds `offset` itself, so a zero difference image stays dark.
fn adaptive_threshold(frame: &GrayFrame, block_size: usize, offset: f32) -> GrayFrame {
    let kernel = gaussian_kernel(block_size);
    let input: Vec<f32> = frame.data.iter().map(|&p| p as f32).collect();
    let local_mean = convolve_separable(&input, frame.width, frame.height, &kernel, Border::Replicate);

    let data = input
        .iter()
        .zip(&local_mean)
        .map(|(&v, &mean)| if v > mean - offset && v > offset { 255 } else { 0 })
        .collect();
    GrayFrame::new(data, frame.width, frame.height)
}

fn erode(frame: &GrayFrame, ksize: usize) -> GrayFrame {
    morph(frame, ksize, |window| window.min().unwrap_or(0))
}

fn dilate(frame: &GrayFrame, ksize: usize) -> GrayFrame {
    morph(frame, ksize, |window| window.max().unwrap_or(0))
}

/// Rectangular structuring element; out-of-frame pixels are ignored.
fn morph<F>(frame: &GrayFrame, ksize: usize, reduce: F) -> GrayFrame
where
    F: Fn(&mut dyn Iterator<Item = u8>) -> u8,
{
    let r = ksize / 2;
    let (w, h) = (frame.width, frame.height);
    let mut data = vec![0u8; w * h];

    for y in 0..h {
        let y0 = y.saturating_sub(r);
        let y1 = (y + r).min(h - 1);
        for x in 0..w {
            let x0 = x.saturating_sub(r);
            let x1 = (x + r).min(w - 1);
            let mut window = (y0..=y1).flat_map(|yy| (x0..=x1).map(move |xx| frame.pixel(xx, yy)));
            data[y * w + x] = reduce(&mut window);
        }
    }
    GrayFrame::new(data, w, h)
}

/// Normalized 1-D gaussian, sigma = 0.3 * ((ksize - 1) * 0.5 - 1) + 0.8
fn gaussian_kernel(ksize: usize) -> Vec<f32> {
    let sigma = 0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (ksize / 2) as f32;
    let mut kernel: Vec<f32> = (0..ksize)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

fn convolve_separable(input: &[f32], w: usize, h: usize, kernel: &[f32], border: Border) -> Vec<f32> {
    let r = (kernel.len() / 2) as isize;
    let mut horizontal = vec![0.0f32; w * h];
    for y in 0..h {
        let row = &input[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = border_index(x as isize + k as isize - r, w, border);
                acc += row[sx] * weight;
            }
            horizontal[y * w + x] = acc;
        }
    }

    let mut out = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = border_index(y as isize + k as isize - r, h, border);
                acc += horizontal[sy * w + x] * weight;
            }
            out[y * w + x] = acc;
        }
    }
    out
}

fn border_index(i: isize, n: usize, border: Border) -> usize {
    let n = n as isize;
    if n == 1 {
        return 0;
    }
    match border {
        Border::Replicate => i.clamp(0, n - 1) as usize,
        Border::Reflect101 => {
            let mut i = i;
            while i < 0 || i >= n {
                i = if i < 0 { -i } else { 2 * n - 2 - i };
            }
            i as usize
        }
    }
}
