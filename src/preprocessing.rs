// src/preprocessing.rs
//
// Decode → downscale → grayscale → histogram equalization.
// Stateless: each call depends only on its input bytes.

use crate::analysis::GrayFrame;
use crate::error::FrameError;
use crate::types::PreprocessConfig;

#[derive(Debug, Clone)]
pub struct Preprocessor {
    resize_factor: f32,
}

impl Preprocessor {
    pub fn new(config: &PreprocessConfig) -> Self {
        Self {
            resize_factor: config.resize_factor,
        }
    }

    /// Turn raw encoded image bytes into a normalized analysis frame
    pub fn normalize(&self, bytes: &[u8]) -> Result<GrayFrame, FrameError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| FrameError::Decode(e.to_string()))?;
        let rgb = decoded.to_rgb8();
        let (src_w, src_h) = (rgb.width() as usize, rgb.height() as usize);

        let dst_w = (src_w as f32 * self.resize_factor).round() as usize;
        let dst_h = (src_h as f32 * self.resize_factor).round() as usize;
        if dst_w == 0 || dst_h == 0 {
            return Err(FrameError::EmptyFrame {
                width: dst_w,
                height: dst_h,
            });
        }

        let resized = resize_bilinear(rgb.as_raw(), 3, src_w, src_h, dst_w, dst_h);
        let mut gray = GrayFrame::from_rgb(&resized, dst_w, dst_h);
        equalize_histogram(&mut gray);
        Ok(gray)
    }
}

/// Bilinear resize of interleaved `channels`-byte pixels, pixel-centre aligned
fn resize_bilinear(
    src: &[u8],
    channels: usize,
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    if src_w == dst_w && src_h == dst_h {
        return src.to_vec();
    }

    let mut dst = vec![0u8; dst_h * dst_w * channels];

    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        let sy = ((dy as f32 + 0.5) * y_ratio - 0.5).max(0.0);
        let sy0 = (sy.floor() as usize).min(src_h - 1);
        let sy1 = (sy0 + 1).min(src_h - 1);
        let fy = sy - sy0 as f32;

        for dx in 0..dst_w {
            let sx = ((dx as f32 + 0.5) * x_ratio - 0.5).max(0.0);
            let sx0 = (sx.floor() as usize).min(src_w - 1);
            let sx1 = (sx0 + 1).min(src_w - 1);
            let fx = sx - sx0 as f32;

            for c in 0..channels {
                let p00 = src[(sy0 * src_w + sx0) * channels + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * channels + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * channels + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * channels + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * channels + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    dst
}

/// Spread the intensity histogram over the full 0-255 range.
fn equalize_histogram(frame: &mut GrayFrame) {
    let total = frame.data.len();
    if total == 0 {
        return;
    }

    let mut hist = [0usize; 256];
    for &p in &frame.data {
        hist[p as usize] += 1;
    }

    let first = hist.iter().position(|&count| count > 0).unwrap_or(0);
    if hist[first] == total {
        // Flat image: nothing to spread
        return;
    }

    let scale = 255.0 / (total - hist[first]) as f64;
    let mut lut = [0u8; 256];
    let mut cumulative = 0usize;
    for level in first + 1..256 {
        cumulative += hist[level];
        lut[level] = (cumulative as f64 * scale).round().min(255.0) as u8;
    }

    for p in frame.data.iter_mut() {
        *p = lut[*p as usize];
    }
}


#[cfg(test)]
mod tests {
    use super::testing::png_frame;
    use super::*;

    #[test]
    fn test_decode_failure() {
        let pre = Preprocessor::new(&PreprocessConfig::default());
        let err = pre.normalize(b"definitely not an image").unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)), "got {:?}", err);
    }

    #[test]
    fn test_downscale_by_factor() {
        let pre = Preprocessor::new(&PreprocessConfig::default());
        let bytes = png_frame(64, 48, |x, _| [x as u8 * 4, 0, 0]);

        let frame = pre.normalize(&bytes).unwrap();
        assert_eq!((frame.width, frame.height), (32, 24));
        assert_eq!(frame.data.len(), 32 * 24);
    }

    #[test]
    fn test_tiny_frame_is_empty() {
        let pre = Preprocessor::new(&PreprocessConfig { resize_factor: 0.1 });
        let bytes = png_frame(2, 2, |_, _| [10, 10, 10]);
        assert!(matches!(
            pre.normalize(&bytes),
            Err(FrameError::EmptyFrame { .. })
        ));
    }

    #[test]
    fn test_equalization_stretches_contrast() {
        let pre = Preprocessor::new(&PreprocessConfig { resize_factor: 1.0 });
        // Low-contrast gradient between 100 and 131
        let bytes = png_frame(32, 32, |x, _| {
            let v = 100 + x as u8;
            [v, v, v]
        });

        let frame = pre.normalize(&bytes).unwrap();
        let min = *frame.data.iter().min().unwrap();
        let max = *frame.data.iter().max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_flat_frame_unchanged() {
        let mut frame = GrayFrame::filled(8, 8, 77);
        equalize_histogram(&mut frame);
        assert!(frame.data.iter().all(|&p| p == 77));
    }

    #[test]
    fn test_resize_identity() {
        let src = vec![255u8; 10 * 10 * 3];
        assert_eq!(resize_bilinear(&src, 3, 10, 10, 10, 10), src);
        assert_eq!(resize_bilinear(&src, 3, 10, 10, 5, 5).len(), 5 * 5 * 3);
    }
}
