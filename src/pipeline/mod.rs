// src/pipeline/mod.rs

pub mod analyzer;
pub mod metrics;
pub mod verdict;

pub use analyzer::{FrameAnalyzer, GatheredFrame, PerformanceSnapshot};
pub use metrics::{MetricsSummary, SessionMetrics};
pub use verdict::{FrameFailure, FrameOutcome, FrameVerdict, VerdictDetails};
