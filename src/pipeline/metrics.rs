// src/pipeline/metrics.rs
//
// Per-session timing and throughput counters. Owned by one analyzer, so
// plain integers are enough.

use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct SessionMetrics {
    frames_analyzed: u64,
    frames_failed: u64,
    total_processing: Duration,
    worst_processing: Duration,
    started_at: Instant,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            frames_analyzed: 0,
            frames_failed: 0,
            total_processing: Duration::ZERO,
            worst_processing: Duration::ZERO,
            started_at: Instant::now(),
        }
    }

    pub fn record_frame(&mut self, elapsed: Duration) {
        self.frames_analyzed += 1;
        self.record_timing(elapsed);
    }

    pub fn record_failure(&mut self, elapsed: Duration) {
        self.frames_failed += 1;
        self.record_timing(elapsed);
    }

    fn record_timing(&mut self, elapsed: Duration) {
        self.total_processing += elapsed;
        if elapsed > self.worst_processing {
            self.worst_processing = elapsed;
        }
    }

    pub fn frames_analyzed(&self) -> u64 {
        self.frames_analyzed
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Successfully analyzed frames per second of session time
    pub fn fps(&self) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed > 0.0 {
            self.frames_analyzed as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let handled = self.frames_analyzed + self.frames_failed;
        let avg_processing_ms = if handled > 0 {
            self.total_processing.as_secs_f64() * 1000.0 / handled as f64
        } else {
            0.0
        };

        MetricsSummary {
            frames_analyzed: self.frames_analyzed,
            frames_failed: self.frames_failed,
            fps: self.fps(),
            avg_processing_ms,
            worst_processing_ms: self.worst_processing.as_secs_f64() * 1000.0,
            elapsed_secs: self.elapsed_secs(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub frames_analyzed: u64,
    pub frames_failed: u64,
    pub fps: f64,
    pub avg_processing_ms: f64,
    pub worst_processing_ms: f64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut metrics = SessionMetrics::new();
        metrics.record_frame(Duration::from_millis(10));
        metrics.record_frame(Duration::from_millis(30));
        metrics.record_failure(Duration::from_millis(20));

        let summary = metrics.summary();
        assert_eq!(summary.frames_analyzed, 2);
        assert_eq!(summary.frames_failed, 1);
        assert!((summary.avg_processing_ms - 20.0).abs() < 1e-6);
        assert!((summary.worst_processing_ms - 30.0).abs() < 1e-6);
        assert!(summary.fps >= 0.0);
    }

    #[test]
    fn test_reset() {
        let mut metrics = SessionMetrics::new();
        metrics.record_frame(Duration::from_millis(5));
        metrics.reset();
        assert_eq!(metrics.frames_analyzed(), 0);
    }
}
