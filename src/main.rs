// src/main.rs
//
// Replays a directory of still frames through one monitoring session, the
// same way a live client would stream them.

use anyhow::{Context, Result};
use exam_proctor::session::{list_reports, JsonFileReportSink, SessionEnd};
use exam_proctor::{Config, HttpFaceLocator, Monitor};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

fn main() -> Result<()> {
    let config_path = std::env::var("PROCTOR_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🎓 Exam proctor starting");
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Thresholds: movement={}, confirm_frames={}, stable_frames={}, max_violations={}",
        config.movement.threshold,
        config.movement.confirmation_frames,
        config.movement.stability_frames,
        config.violations.max_violations
    );

    // The blocking HTTP client must be created and dropped outside the async runtime
    let locator = Arc::new(HttpFaceLocator::new(&config.locator)?);
    info!("📡 Face locator: {}", config.locator.url);

    let sink = Arc::new(JsonFileReportSink::new(&config.reports.output_dir));
    let monitor = Monitor::new(config, locator, sink);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let result = runtime.block_on(replay(&monitor));
    drop(runtime);
    drop(monitor);
    result
}

async fn replay(monitor: &Monitor) -> Result<()> {
    let config = monitor.config();
    let frame_files = find_frame_files(Path::new(&config.replay.input_dir))?;
    if frame_files.is_empty() {
        error!("No frames found in {}", config.replay.input_dir);
        return Ok(());
    }
    info!("Found {} frame(s) to replay", frame_files.len());

    let session = monitor.start_session(&config.replay.student_id, &config.replay.exam_id)?;

    let (frames_tx, frames_rx) = mpsc::channel(config.session.channel_capacity);
    let (outbound_tx, mut outbound_rx) = mpsc::channel(config.session.channel_capacity);
    let runner = tokio::spawn(session.run(frames_rx, outbound_tx));

    let printer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => info!("→ {}", json),
                Err(e) => warn!("Could not serialize {} message: {}", message.kind(), e),
            }
        }
    });

    let interval = Duration::from_millis(config.replay.frame_interval_ms);
    for path in &frame_files {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        if frames_tx.send(bytes).await.is_err() {
            info!("Session closed, stopping replay at {}", path.display());
            break;
        }
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }
    drop(frames_tx);

    let end = runner.await.context("Session task failed")?;
    printer.await.context("Printer task failed")?;

    match end {
        SessionEnd::Terminated(report) => {
            warn!("🚨 Session terminated with {} violations", report.violations.len());
            for (idx, violation) in report.violations.iter().enumerate() {
                warn!(
                    "  #{} at {}: {} (faces={}, eyes={}, movement={})",
                    idx + 1,
                    violation.timestamp.format("%H:%M:%S"),
                    violation.reason,
                    violation.details.face_count,
                    violation.details.eyes_detected,
                    violation.details.movement_level
                );
            }
        }
        SessionEnd::Disconnected { violations } => {
            info!("✓ Replay finished with {} violation(s)", violations);
        }
    }

    let reports = list_reports(Path::new(&config.reports.output_dir))?;
    info!("Reports on disk: {}", reports.len());
    for summary in reports.iter().take(5) {
        info!(
            "  {} ({}/{}, {} violations)",
            summary.filename, summary.student_id, summary.exam_id, summary.violation_count
        );
    }

    Ok(())
}

/// Image files under `dir`, in file-name order
fn find_frame_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        anyhow::bail!("Frame directory {} does not exist", dir.display());
    }

    let mut frames: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();

    frames.sort();
    Ok(frames)
}
