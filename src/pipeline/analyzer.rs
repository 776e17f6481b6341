// src/pipeline/analyzer.rs
//
// Per-session frame analyzer and verdict aggregator.
//
// One frame = preprocess → locate faces → locate eyes (largest face) →
// measure movement → debounce → verdict.
//
// All facts are gathered before any state is touched. If any stage fails,
// the frame comes back as a FrameFailure and the estimator's reference
// frame, the hysteresis counters and the fps accounting all stay exactly
// as they were, so an error frame is invisible to its neighbours.
// `gather` borrows the analyzer immutably, which lets the session runner
// abandon a slow frame without any of its work reaching `commit`.

use super::metrics::{MetricsSummary, SessionMetrics};
use super::verdict::{FrameFailure, FrameOutcome, FrameVerdict, VerdictDetails};
use crate::analysis::{
    DebounceCounters, FrameFacts, GrayFrame, HysteresisFlags, HysteresisTracker, MovementEstimator,
    MovementSample,
};
use crate::detection::{largest_face, FaceLocator, SearchParams};
use crate::error::FrameError;
use crate::preprocessing::Preprocessor;
use crate::types::Config;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSnapshot {
    pub total_frames: u64,
    pub elapsed_time: f64,
    pub fps: f64,
    pub movement_history: Vec<u64>,
    pub current_state: HysteresisFlags,
    pub counters: DebounceCounters,
    pub metrics: MetricsSummary,
}

/// Result of the side-effect-free half of a frame
#[derive(Debug, Clone)]
pub struct GatheredFrame {
    frame: GrayFrame,
    facts: FrameFacts,
}

pub struct FrameAnalyzer {
    preprocessor: Preprocessor,
    locator: Arc<dyn FaceLocator>,
    face_params: SearchParams,
    eye_params: SearchParams,
    movement: MovementEstimator,
    tracker: HysteresisTracker,
    metrics: SessionMetrics,
}

impl FrameAnalyzer {
    pub fn new(config: &Config, locator: Arc<dyn FaceLocator>) -> Self {
        Self {
            preprocessor: Preprocessor::new(&config.preprocessing),
            locator,
            face_params: SearchParams::faces(&config.face_detection),
            eye_params: SearchParams::eyes(&config.face_detection),
            movement: MovementEstimator::new(config.movement.clone()),
            tracker: HysteresisTracker::new(&config.face_detection, config.movement.clone()),
            metrics: SessionMetrics::new(),
        }
    }

    /// Analyze one encoded frame: gather, then commit.
    pub fn analyze(&mut self, bytes: &[u8]) -> FrameOutcome {
        let started = Instant::now();
        match self.gather(bytes) {
            Ok(gathered) => Ok(self.commit(gathered, started)),
            Err(error) => Err(self.fail(error, started.elapsed())),
        }
    }

    /// Collect every per-frame fact without mutating session state.
    ///
    /// This is the expensive half of a frame (decode, locator calls,
    /// movement scoring) and is safe to abandon at any point.
    pub fn gather(&self, bytes: &[u8]) -> Result<GatheredFrame, FrameError> {
        let frame = self.preprocessor.normalize(bytes)?;

        let faces = self
            .locator
            .locate_faces(&frame, &self.face_params)
            .map_err(|e| FrameError::Locator(format!("{:#}", e)))?;

        let eyes_detected = match largest_face(&faces) {
            Some(face) => {
                let region = frame.crop(face);
                if region.is_empty() {
                    Some(0)
                } else {
                    let eyes = self
                        .locator
                        .locate_eyes(&region, &self.eye_params)
                        .map_err(|e| FrameError::Locator(format!("{:#}", e)))?;
                    Some(eyes.len())
                }
            }
            None => None,
        };

        let facts = FrameFacts {
            face_count: faces.len(),
            eyes_detected,
            movement: self.movement.measure(&frame),
        };
        Ok(GatheredFrame { frame, facts })
    }

    /// Fold gathered facts into the session state and build the verdict.
    pub fn commit(&mut self, gathered: GatheredFrame, started: Instant) -> FrameVerdict {
        let GatheredFrame { frame, facts } = gathered;

        self.movement.remember(&frame);
        let update = self.tracker.update(&facts);
        self.metrics.record_frame(started.elapsed());

        // Recomputed last and authoritative for the whole pass
        let reason = update.flags.reason();
        let is_cheating = !reason.is_empty();
        if is_cheating {
            debug!("Frame flagged: {}", reason);
        }

        let movement = facts.movement.unwrap_or_else(MovementSample::none);
        FrameVerdict {
            is_cheating,
            reason,
            details: VerdictDetails {
                face_count: facts.face_count,
                eyes_detected: facts.eyes_detected.unwrap_or(0),
                movement_level: movement.score,
                movement_percentage: movement.percentage,
                fps: self.metrics.fps(),
                processing_time: started.elapsed().as_secs_f64(),
            },
            warnings: update.warnings,
            error: None,
        }
    }

    /// Account for a frame that could not be analyzed. Only the failure
    /// counter moves; flags, counters, histories and fps stay as they were.
    pub fn fail(&mut self, error: FrameError, elapsed: Duration) -> FrameFailure {
        self.metrics.record_failure(elapsed);
        warn!("Frame analysis failed ({}): {}", error.kind(), error);
        FrameFailure {
            error,
            details: VerdictDetails {
                fps: self.metrics.fps(),
                processing_time: elapsed.as_secs_f64(),
                ..Default::default()
            },
        }
    }

    pub fn flags(&self) -> HysteresisFlags {
        self.tracker.flags()
    }

    pub fn counters(&self) -> DebounceCounters {
        self.tracker.counters()
    }

    pub fn performance(&self) -> PerformanceSnapshot {
        PerformanceSnapshot {
            total_frames: self.metrics.frames_analyzed(),
            elapsed_time: self.metrics.elapsed_secs(),
            fps: self.metrics.fps(),
            movement_history: self.tracker.movement_history(),
            current_state: self.tracker.flags(),
            counters: self.tracker.counters(),
            metrics: self.metrics.summary(),
        }
    }

    /// Back to a fresh-session state: no reference frame, no history,
    /// all counters and flags cleared.
    pub fn reset(&mut self) {
        self.movement.reset();
        self.tracker.reset();
        self.metrics.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::testing::{Scripted, ScriptedLocator};
    use crate::preprocessing::testing::{png_frame, still_frame};

    fn analyzer(script: Vec<Scripted>) -> FrameAnalyzer {
        FrameAnalyzer::new(&Config::default(), Arc::new(ScriptedLocator::new(script)))
    }

    #[test]
    fn test_no_face_verdict() {
        let mut a = analyzer(vec![Scripted::faces(0)]);
        let verdict = a.analyze(&still_frame()).unwrap();

        assert!(verdict.is_cheating);
        assert!(verdict.reason.contains("no_face"));
        assert_eq!(verdict.details.face_count, 0);
        assert_eq!(verdict.details.eyes_detected, 0, "Eyes stay at default");
        assert_eq!(a.counters().eye_failure_count, 0);
    }

    #[test]
    fn test_multiple_faces_verdict() {
        let mut a = analyzer(vec![Scripted::faces(2)]);
        let verdict = a.analyze(&still_frame()).unwrap();

        assert!(verdict.is_cheating);
        assert!(verdict.reason.contains("multiple_faces"));
        assert_eq!(verdict.details.face_count, 2);
        assert_eq!(verdict.details.eyes_detected, 2);
        assert!(verdict.warnings.iter().any(|w| w.contains("2 faces")));
    }

    #[test]
    fn test_clean_frame() {
        let mut a = analyzer(vec![Scripted::faces(1), Scripted::faces(1)]);
        let first = a.analyze(&still_frame()).unwrap();
        let second = a.analyze(&still_frame()).unwrap();

        assert!(!first.is_cheating);
        assert!(first.reason.is_empty());
        assert!(first.error.is_none());
        assert!(!second.is_cheating);
        assert_eq!(second.details.movement_level, 0, "Identical frames do not move");
        assert_eq!(a.performance().total_frames, 2);
    }

    #[test]
    fn test_decode_failure_fails_open() {
        let mut a = analyzer(vec![]);
        let failure = a.analyze(b"garbage").unwrap_err();

        assert!(matches!(failure.error, FrameError::Decode(_)));
        let verdict = failure.into_verdict();
        assert!(!verdict.is_cheating);
        assert!(verdict.error.is_some());
    }

    #[test]
    fn test_locator_failure_fails_open() {
        let mut a = analyzer(vec![Scripted::failure()]);
        let failure = a.analyze(&still_frame()).unwrap_err();
        assert!(matches!(failure.error, FrameError::Locator(_)));
    }

    #[test]
    fn test_error_frames_are_transparent() {
        let blind = Scripted::faces(1).with_eyes(0);

        // Reference run: four eye failures back to back, then the fifth raises the flag
        let mut reference = analyzer(vec![blind; 5]);
        for _ in 0..4 {
            reference.analyze(&still_frame()).unwrap();
        }

        // Same run with a decode failure and a locator failure wedged in
        let mut a = analyzer(vec![blind, blind, Scripted::failure(), blind, blind, blind]);
        a.analyze(&still_frame()).unwrap();
        a.analyze(&still_frame()).unwrap();
        let before = (a.flags(), a.counters());
        assert!(a.analyze(b"not an image").is_err());
        assert!(a.analyze(&still_frame()).is_err());
        assert_eq!((a.flags(), a.counters()), before);
        a.analyze(&still_frame()).unwrap();
        a.analyze(&still_frame()).unwrap();

        assert_eq!(a.counters(), reference.counters());
        assert_eq!(a.flags(), reference.flags());
        assert!(!a.flags().no_eyes);

        let verdict = a.analyze(&still_frame()).unwrap();
        assert!(verdict.reason.contains("no_eyes"));
    }

    #[test]
    fn test_abandoned_gathers_leave_no_trace() {
        let mut a = analyzer(vec![Scripted::faces(1).with_eyes(0); 4]);
        for _ in 0..3 {
            a.gather(&still_frame()).unwrap();
        }
        assert_eq!(a.counters(), DebounceCounters::default());
        assert_eq!(a.performance().total_frames, 0);
        assert!(a.performance().movement_history.is_empty());

        let gathered = a.gather(&still_frame()).unwrap();
        let verdict = a.commit(gathered, Instant::now());
        assert!(!verdict.is_cheating);
        assert_eq!(a.counters().eye_failure_count, 1, "Only the committed frame counts");
        assert_eq!(a.performance().total_frames, 1);
    }

    #[test]
    fn test_shape_change_skips_movement() {
        let mut a = analyzer(vec![]);
        a.analyze(&still_frame()).unwrap();
        let other = png_frame(40, 40, |x, y| [(x * y) as u8, 0, 0]);
        let verdict = a.analyze(&other).unwrap();

        assert_eq!(verdict.details.movement_level, 0);
        assert!(a.performance().movement_history.is_empty());
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        let mut a = analyzer(vec![Scripted::faces(1).with_eyes(0); 8]);
        for _ in 0..6 {
            a.analyze(&still_frame()).unwrap();
        }
        assert!(a.flags().no_eyes);

        a.reset();
        assert_eq!(a.flags(), HysteresisFlags::default());
        assert_eq!(a.counters(), DebounceCounters::default());
        assert_eq!(a.performance().total_frames, 0);
    }
}
