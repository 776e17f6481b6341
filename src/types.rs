// src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preprocessing: PreprocessConfig,
    pub face_detection: FaceDetectionConfig,
    pub movement: MovementConfig,
    pub violations: ViolationConfig,
    pub session: SessionConfig,
    pub locator: LocatorConfig,
    pub reports: ReportConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Downscale applied to every decoded frame before analysis
    pub resize_factor: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { resize_factor: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDetectionConfig {
    pub scale_factor: f32,
    pub min_neighbors: u32,
    pub min_face_size: (u32, u32),
    pub eye_scale_factor: f32,
    pub eye_min_neighbors: u32,
    pub min_eye_size: (u32, u32),
    pub min_eye_detections: usize,
    pub max_eye_failures: u32,
}

impl Default for FaceDetectionConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.05,
            min_neighbors: 6,
            min_face_size: (100, 100),
            eye_scale_factor: 1.1,
            eye_min_neighbors: 5,
            min_eye_size: (30, 30),
            min_eye_detections: 1,
            max_eye_failures: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub threshold: u64,
    pub confirmation_frames: u32,
    pub stability_frames: u32,
    pub history_size: usize,
    pub stable_history_size: usize,
    pub blur_kernel: usize,
    pub threshold_block_size: usize,
    pub threshold_offset: f32,
    pub morph_kernel: usize,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            threshold: 500_000,
            confirmation_frames: 5,
            stability_frames: 10,
            history_size: 15,
            stable_history_size: 30,
            blur_kernel: 5,
            threshold_block_size: 11,
            threshold_offset: 2.0,
            morph_kernel: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViolationConfig {
    pub max_violations: u32,
}

impl Default for ViolationConfig {
    fn default() -> Self {
        Self { max_violations: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Per-frame analysis deadline. None disables the deadline.
    pub frame_timeout_ms: Option<u64>,
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_timeout_ms: None,
            channel_capacity: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub jpeg_quality: u8,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8500".to_string(),
            timeout_secs: 5,
            jpeg_quality: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: "reports".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub input_dir: String,
    pub student_id: String,
    pub exam_id: String,
    pub frame_interval_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input_dir: "frames".to_string(),
            student_id: "student".to_string(),
            exam_id: "exam".to_string(),
            frame_interval_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "exam_proctor=info".to_string(),
        }
    }
}
