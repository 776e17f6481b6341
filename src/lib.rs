// src/lib.rs

pub mod analysis;
pub mod config;
pub mod detection;
pub mod error;
pub mod pipeline;
pub mod preprocessing;
pub mod session;
pub mod types;

pub use detection::{FaceLocator, HttpFaceLocator};
pub use error::{FrameError, SessionError};
pub use pipeline::{FrameAnalyzer, FrameOutcome, FrameVerdict};
pub use session::{Monitor, MonitorSession, OutboundMessage, SessionEnd};
pub use types::Config;
