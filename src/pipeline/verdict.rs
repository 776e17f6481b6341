// src/pipeline/verdict.rs

use crate::error::FrameError;
use serde::{Deserialize, Serialize};

/// Supporting numbers for a verdict, copied verbatim into violation records
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VerdictDetails {
    pub face_count: usize,
    pub eyes_detected: usize,
    pub movement_level: u64,
    pub movement_percentage: f64,
    pub fps: f64,
    /// Wall time spent on this frame, seconds
    pub processing_time: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameVerdict {
    pub is_cheating: bool,
    /// Comma-joined active flags, authoritative for the frame
    pub reason: String,
    pub details: VerdictDetails,
    /// Side messages from the same pass; never feed into `reason`
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A frame that could not be analyzed. State carried between frames is
/// untouched when this is returned.
#[derive(Debug)]
pub struct FrameFailure {
    pub error: FrameError,
    pub details: VerdictDetails,
}

impl FrameFailure {
    /// Fail-open verdict: never counts as cheating
    pub fn into_verdict(self) -> FrameVerdict {
        FrameVerdict {
            is_cheating: false,
            reason: String::new(),
            details: self.details,
            warnings: Vec::new(),
            error: Some(self.error.to_string()),
        }
    }
}

pub type FrameOutcome = Result<FrameVerdict, FrameFailure>;
