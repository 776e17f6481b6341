// src/session/report.rs
//
// Terminal session report and the sinks that persist it.
//
// The pipeline only builds the report value; a ReportSink decides where it
// goes. Reports are named violation_{student}_{exam}_{YYYYmmdd_HHMMSS}.

use super::violations::{ViolationRecord, ViolationTracker};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub student_id: String,
    pub exam_id: String,
    pub violations: Vec<ViolationRecord>,
    pub termination_time: DateTime<Utc>,
}

impl SessionReport {
    /// Snapshot the full, ordered violation history at termination time.
    pub fn build(student_id: &str, exam_id: &str, tracker: &ViolationTracker) -> Self {
        Self {
            student_id: student_id.to_string(),
            exam_id: exam_id.to_string(),
            violations: tracker.history().to_vec(),
            termination_time: Utc::now(),
        }
    }

    /// Suggested artifact name, without extension. Safe to use as a file
    /// name whatever the ids contain.
    pub fn reference_name(&self) -> String {
        format!(
            "violation_{}_{}_{}",
            file_safe(&self.student_id),
            file_safe(&self.exam_id),
            self.termination_time.format("%Y%m%d_%H%M%S_%3f")
        )
    }
}

/// Keep `[A-Za-z0-9_-]`, replace everything else with `_`.
fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Destination for terminal reports.
///
/// Called once per terminated session. The returned string is handed back
/// to the client as the report reference.
pub trait ReportSink: Send + Sync {
    fn deliver(&self, report: &SessionReport) -> Result<String>;
}

/// Writes each report as pretty JSON into a directory
pub struct JsonFileReportSink {
    output_dir: PathBuf,
}

impl JsonFileReportSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

impl ReportSink for JsonFileReportSink {
    fn deliver(&self, report: &SessionReport) -> Result<String> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create report dir {}", self.output_dir.display())
        })?;

        let (path, file) = create_unique(&self.output_dir, &report.reference_name())?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Report saved to {}", path.display());
        Ok(path.display().to_string())
    }
}

/// Open `{stem}.json` in `dir`, or `{stem}_{n}.json` if taken. Never
/// overwrites an existing report.
fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, File)> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{}.json", stem)
        } else {
            format!("{}_{}.json", stem, attempt)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e).with_context(|| format!("Failed to create {}", path.display())),
        }
    }
    bail!("No free report name for {} in {}", stem, dir.display())
}

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Catalog entry for a stored report
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub filename: String,
    pub student_id: String,
    pub exam_id: String,
    pub timestamp: DateTime<Utc>,
    pub violation_count: usize,
    pub size: u64,
}

pub fn load_report(path: &Path) -> Result<SessionReport> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid report {}", path.display()))
}

/// All JSON reports in `dir`, newest first. Unreadable files are skipped.
pub fn list_reports(dir: &Path) -> Result<Vec<ReportSummary>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut summaries = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }

        match load_report(path) {
            Ok(report) => summaries.push(ReportSummary {
                filename: entry.file_name().to_string_lossy().into_owned(),
                student_id: report.student_id,
                exam_id: report.exam_id,
                timestamp: report.termination_time,
                violation_count: report.violations.len(),
                size: entry.metadata().map(|m| m.len()).unwrap_or(0),
            }),
            Err(e) => warn!("Skipping report {}: {:#}", path.display(), e),
        }
    }

    summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(summaries)
}
