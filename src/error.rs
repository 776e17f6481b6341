// src/error.rs
//
// Per-frame failure taxonomy. Every variant is recoverable: the frame is
// reported as an error and the session keeps running.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Image decoding failed: {0}")]
    Decode(String),

    #[error("Frame has no pixels after preprocessing ({width}x{height})")]
    EmptyFrame { width: usize, height: usize },

    #[error("Face locator failed: {0}")]
    Locator(String),

    #[error("Frame analysis exceeded {0} ms")]
    Timeout(u64),

    #[error("Analysis worker failed: {0}")]
    Worker(String),
}

impl FrameError {
    /// Stable short label used in logs and outbound error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::EmptyFrame { .. } => "empty_frame",
            Self::Locator(_) => "locator",
            Self::Timeout(_) => "timeout",
            Self::Worker(_) => "worker",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session already active for student {student_id} in exam {exam_id}")]
    AlreadyActive { student_id: String, exam_id: String },
}
