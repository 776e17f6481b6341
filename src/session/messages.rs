// src/session/messages.rs
//
// One outbound message per processed frame, JSON-tagged by `type`.

use crate::pipeline::VerdictDetails;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const STATUS_MESSAGE: &str = "Monitoring normal";
pub const ERROR_MESSAGE: &str = "System error processing your video feed";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Status {
        message: String,
        violation_count: u32,
        timestamp: DateTime<Utc>,
    },
    Warning {
        message: String,
        violation_count: u32,
        details: VerdictDetails,
        timestamp: DateTime<Utc>,
    },
    Termination {
        reason: String,
        violations: u32,
        report_reference: String,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl OutboundMessage {
    pub fn status(violation_count: u32) -> Self {
        Self::Status {
            message: STATUS_MESSAGE.to_string(),
            violation_count,
            timestamp: Utc::now(),
        }
    }

    pub fn warning(violation_count: u32, max_violations: u32, reason: &str, details: VerdictDetails) -> Self {
        Self::Warning {
            message: format!("Violation {}/{}: {}", violation_count, max_violations, reason),
            violation_count,
            details,
            timestamp: Utc::now(),
        }
    }

    pub fn termination(violations: u32, report_reference: String) -> Self {
        Self::Termination {
            reason: format!("Exam terminated due to {} cheating violations", violations),
            violations,
            report_reference,
            timestamp: Utc::now(),
        }
    }

    pub fn error() -> Self {
        Self::Error {
            message: ERROR_MESSAGE.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Warning { .. } => "warning",
            Self::Termination { .. } => "termination",
            Self::Error { .. } => "error",
        }
    }
}
