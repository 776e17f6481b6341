// src/session/violations.rs
//
// Append-only violation history for one session. The count is the length
// of the history, so the two can never disagree; nothing decays over time.

use crate::pipeline::{FrameVerdict, VerdictDetails};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub details: VerdictDetails,
}

#[derive(Debug, Clone)]
pub struct ViolationTracker {
    max_violations: u32,
    history: Vec<ViolationRecord>,
    last_violation_time: Option<DateTime<Utc>>,
}

impl ViolationTracker {
    pub fn new(max_violations: u32) -> Self {
        Self {
            max_violations,
            history: Vec::new(),
            last_violation_time: None,
        }
    }

    /// Record the verdict if it is a cheating verdict. Returns the new count.
    pub fn record(&mut self, verdict: &FrameVerdict) -> Option<u32> {
        if !verdict.is_cheating {
            return None;
        }
        Some(self.add_violation(&verdict.reason, verdict.details))
    }

    pub fn add_violation(&mut self, reason: &str, details: VerdictDetails) -> u32 {
        let now = Utc::now();
        self.history.push(ViolationRecord {
            timestamp: now,
            reason: reason.to_string(),
            details,
        });
        self.last_violation_time = Some(now);
        self.violation_count()
    }

    pub fn violation_count(&self) -> u32 {
        self.history.len() as u32
    }

    pub fn max_violations(&self) -> u32 {
        self.max_violations
    }

    pub fn should_terminate(&self) -> bool {
        self.violation_count() >= self.max_violations
    }

    pub fn last_violation_time(&self) -> Option<DateTime<Utc>> {
        self.last_violation_time
    }

    /// None until the first violation is recorded
    pub fn time_since_last_violation(&self) -> Option<Duration> {
        self.last_violation_time.map(|at| Utc::now() - at)
    }

    pub fn history(&self) -> &[ViolationRecord] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.last_violation_time = None;
    }
}
