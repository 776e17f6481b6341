// src/analysis/frame.rs
//
// Single-channel intensity frame shared by every analysis stage.
// Row-major storage: pixel at (x, y) = data[y * width + x]

use crate::detection::BoundingBox;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayFrame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl GrayFrame {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
        }
    }

    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self::new(vec![value; width * height], width, height)
    }

    /// Convert from RGB packed bytes (3 bytes per pixel)
    pub fn from_rgb(rgb: &[u8], width: usize, height: usize) -> Self {
        let mut gray = Vec::with_capacity(width * height);
        for pixel in rgb.chunks_exact(3) {
            // ITU-R BT.601 luma
            let g = 0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32;
            gray.push(g.round().min(255.0) as u8);
        }
        Self::new(gray, width, height)
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    pub fn same_shape(&self, other: &GrayFrame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Copy out the region covered by `region`, clipped to the frame.
    pub fn crop(&self, region: &BoundingBox) -> GrayFrame {
        let x0 = (region.x as usize).min(self.width);
        let y0 = (region.y as usize).min(self.height);
        let x1 = (region.x as usize + region.width as usize).min(self.width);
        let y1 = (region.y as usize + region.height as usize).min(self.height);

        let (w, h) = (x1 - x0, y1 - y0);
        let mut data = Vec::with_capacity(w * h);
        for y in y0..y1 {
            let row = y * self.width;
            data.extend_from_slice(&self.data[row + x0..row + x1]);
        }
        GrayFrame::new(data, w, h)
    }

    /// Apply `f` to every pixel pair of two same-shaped frames.
    pub fn zip_map(&self, other: &GrayFrame, f: impl Fn(u8, u8) -> u8) -> GrayFrame {
        debug_assert!(self.same_shape(other));
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| f(a, b))
            .collect();
        GrayFrame::new(data, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_clips_to_bounds() {
        let data: Vec<u8> = (0..16).collect();
        let frame = GrayFrame::new(data, 4, 4);

        let roi = frame.crop(&BoundingBox::new(2, 2, 10, 10));
        assert_eq!((roi.width, roi.height), (2, 2));
        assert_eq!(roi.data, vec![10, 11, 14, 15]);
    }

    #[test]
    fn test_from_rgb_luma() {
        let frame = GrayFrame::from_rgb(&[255, 255, 255, 0, 0, 0], 2, 1);
        assert_eq!(frame.data, vec![255, 0]);
    }
}
