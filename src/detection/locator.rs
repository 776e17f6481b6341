// src/detection/locator.rs
//
// Contract for the face/eye localization backend. The pipeline only relies
// on "zero or more axis-aligned boxes per call, synchronously"; how a
// backend finds them is its own business.

use crate::analysis::GrayFrame;
use crate::types::FaceDetectionConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Multi-scale search parameters handed to the backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchParams {
    pub scale_factor: f32,
    pub min_neighbors: u32,
    pub min_size: (u32, u32),
}

impl SearchParams {
    pub fn faces(config: &FaceDetectionConfig) -> Self {
        Self {
            scale_factor: config.scale_factor,
            min_neighbors: config.min_neighbors,
            min_size: config.min_face_size,
        }
    }

    pub fn eyes(config: &FaceDetectionConfig) -> Self {
        Self {
            scale_factor: config.eye_scale_factor,
            min_neighbors: config.eye_min_neighbors,
            min_size: config.min_eye_size,
        }
    }
}

/// Pluggable face/eye localization backend.
///
/// Implementations must be deterministic for a fixed model and hold no
/// per-session state; one instance may serve every session.
pub trait FaceLocator: Send + Sync {
    /// Locate faces in a whole normalized frame.
    fn locate_faces(&self, frame: &GrayFrame, params: &SearchParams) -> Result<Vec<BoundingBox>>;

    /// Locate eyes inside an already-cropped face region.
    fn locate_eyes(&self, region: &GrayFrame, params: &SearchParams) -> Result<Vec<BoundingBox>>;
}

/// Largest face by area; ties go to the earliest box.
pub fn largest_face(faces: &[BoundingBox]) -> Option<&BoundingBox> {
    faces.iter().rev().max_by_key(|face| face.area())
}
