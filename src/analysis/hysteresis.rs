// src/analysis/hysteresis.rs
//
// Per-session debounced behavior flags.
//
//   multiple_faces      direct from this frame's face count
//   no_face             direct from this frame's face count
//   no_eyes             on after `max_eye_failures` consecutive misses,
//                       off on the first frame with enough eyes
//   excessive_movement  on after `confirmation_frames` above-threshold frames
//                       AND weighted average above threshold,
//                       off after `stability_frames` consecutive calm frames
//
// Counters only move forward with frames; nothing decays on its own.
// `reset()` is the single way back to the initial state.

use super::history::RingBuffer;
use super::movement::MovementSample;
use crate::types::{FaceDetectionConfig, MovementConfig};
use serde::Serialize;
use tracing::debug;

/// The four suspicious-behavior signals, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorFlag {
    MultipleFaces,
    NoFace,
    NoEyes,
    ExcessiveMovement,
}

impl BehaviorFlag {
    pub const ALL: [BehaviorFlag; 4] = [
        Self::MultipleFaces,
        Self::NoFace,
        Self::NoEyes,
        Self::ExcessiveMovement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleFaces => "multiple_faces",
            Self::NoFace => "no_face",
            Self::NoEyes => "no_eyes",
            Self::ExcessiveMovement => "excessive_movement",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HysteresisFlags {
    pub multiple_faces: bool,
    pub no_face: bool,
    pub no_eyes: bool,
    pub excessive_movement: bool,
}

impl HysteresisFlags {
    pub fn is_set(&self, flag: BehaviorFlag) -> bool {
        match flag {
            BehaviorFlag::MultipleFaces => self.multiple_faces,
            BehaviorFlag::NoFace => self.no_face,
            BehaviorFlag::NoEyes => self.no_eyes,
            BehaviorFlag::ExcessiveMovement => self.excessive_movement,
        }
    }

    pub fn active(&self) -> Vec<BehaviorFlag> {
        BehaviorFlag::ALL
            .into_iter()
            .filter(|flag| self.is_set(*flag))
            .collect()
    }

    pub fn any(&self) -> bool {
        BehaviorFlag::ALL.iter().any(|flag| self.is_set(*flag))
    }

    /// Comma-joined names of the active flags, in fixed order
    pub fn reason(&self) -> String {
        self.active()
            .iter()
            .map(|flag| flag.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DebounceCounters {
    pub eye_failure_count: u32,
    pub consecutive_movement_frames: u32,
    pub consecutive_stable_frames: u32,
}

/// Everything observed about one frame that the tracker consumes
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameFacts {
    pub face_count: usize,
    /// None when no face was present, eyes were never searched
    pub eyes_detected: Option<usize>,
    /// None on the first frame of a session or after a shape change
    pub movement: Option<MovementSample>,
}

#[derive(Debug, Clone)]
pub struct HysteresisUpdate {
    pub flags: HysteresisFlags,
    pub weighted_movement: Option<f64>,
    /// Side messages raised while evaluating this frame
    pub warnings: Vec<String>,
}

pub struct HysteresisTracker {
    min_eye_detections: usize,
    max_eye_failures: u32,
    movement: MovementConfig,

    flags: HysteresisFlags,
    counters: DebounceCounters,
    movement_history: RingBuffer<u64>,
    stable_history: RingBuffer<bool>,
}

impl HysteresisTracker {
    pub fn new(faces: &FaceDetectionConfig, movement: MovementConfig) -> Self {
        Self {
            min_eye_detections: faces.min_eye_detections,
            max_eye_failures: faces.max_eye_failures,
            movement_history: RingBuffer::with_capacity(movement.history_size),
            stable_history: RingBuffer::with_capacity(movement.stable_history_size),
            movement,
            flags: HysteresisFlags::default(),
            counters: DebounceCounters::default(),
        }
    }

    /// Fold one frame's facts into the flags.
    pub fn update(&mut self, facts: &FrameFacts) -> HysteresisUpdate {
        let mut warnings = Vec::new();

        self.flags.multiple_faces = facts.face_count > 1;
        if self.flags.multiple_faces {
            warnings.push(format!("Detected {} faces in frame", facts.face_count));
        }

        self.flags.no_face = facts.face_count == 0;
        if self.flags.no_face {
            warnings.push("No face detected in frame".to_string());
        }

        if facts.face_count > 0 {
            if let Some(eyes) = facts.eyes_detected {
                self.update_eyes(eyes, &mut warnings);
            }
        }

        let weighted_movement = facts
            .movement
            .map(|sample| self.update_movement(sample, &mut warnings));

        HysteresisUpdate {
            flags: self.flags,
            weighted_movement,
            warnings,
        }
    }

    fn update_eyes(&mut self, eyes: usize, warnings: &mut Vec<String>) {
        if eyes < self.min_eye_detections {
            self.counters.eye_failure_count = self.counters.eye_failure_count.saturating_add(1);
            if self.counters.eye_failure_count >= self.max_eye_failures {
                self.flags.no_eyes = true;
                warnings.push(format!(
                    "Eye detection failed for {} consecutive frames",
                    self.counters.eye_failure_count
                ));
            }
        } else {
            self.counters.eye_failure_count = 0;
            self.flags.no_eyes = false;
        }
    }

    fn update_movement(&mut self, sample: MovementSample, warnings: &mut Vec<String>) -> f64 {
        let threshold = self.movement.threshold;
        let above = sample.score > threshold;

        self.movement_history.push(sample.score);
        self.stable_history.push(sample.score < threshold);
        let average = self.weighted_movement();

        let counters = &mut self.counters;
        if above {
            counters.consecutive_movement_frames = counters.consecutive_movement_frames.saturating_add(1);
            counters.consecutive_stable_frames = 0;
        } else {
            counters.consecutive_movement_frames = counters.consecutive_movement_frames.saturating_sub(1);
            counters.consecutive_stable_frames = counters.consecutive_stable_frames.saturating_add(1);
        }

        if counters.consecutive_movement_frames >= self.movement.confirmation_frames
            && average > threshold as f64
        {
            self.flags.excessive_movement = true;
            warnings.push(format!(
                "Sustained movement over {} frames",
                counters.consecutive_movement_frames
            ));
        } else if counters.consecutive_stable_frames >= self.movement.stability_frames {
            if self.flags.excessive_movement {
                debug!(
                    "Movement settled after {} stable frames",
                    counters.consecutive_stable_frames
                );
            }
            self.flags.excessive_movement = false;
        }

        average
    }

    /// Weighted mean of the movement window, weights rising linearly from
    /// 0.1 (oldest) to 1.0 (newest).
    pub fn weighted_movement(&self) -> f64 {
        let n = self.movement_history.len();
        if n == 0 {
            return 0.0;
        }

        let weight = |i: usize| {
            if n == 1 {
                0.1
            } else {
                0.1 + 0.9 * i as f64 / (n - 1) as f64
            }
        };

        let (weighted_sum, weight_sum) = self
            .movement_history
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(acc, total), (i, &score)| {
                let w = weight(i);
                (acc + w * score as f64, total + w)
            });
        weighted_sum / weight_sum
    }

    pub fn flags(&self) -> HysteresisFlags {
        self.flags
    }

    pub fn counters(&self) -> DebounceCounters {
        self.counters
    }

    pub fn movement_history(&self) -> Vec<u64> {
        self.movement_history.to_vec()
    }

    pub fn stable_history(&self) -> Vec<bool> {
        self.stable_history.to_vec()
    }

    pub fn reset(&mut self) {
        self.flags = HysteresisFlags::default();
        self.counters = DebounceCounters::default();
        self.movement_history.clear();
        self.stable_history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HIGH: u64 = 600_000;
    const LOW: u64 = 1_000;

    fn tracker() -> HysteresisTracker {
        HysteresisTracker::new(&FaceDetectionConfig::default(), MovementConfig::default())
    }

    fn calm_face(score: u64) -> FrameFacts {
        FrameFacts {
            face_count: 1,
            eyes_detected: Some(2),
            movement: Some(MovementSample {
                score,
                percentage: 0.0,
                changed_pixels: score,
            }),
        }
    }

    fn feed(tracker: &mut HysteresisTracker, scores: &[u64]) -> Vec<bool> {
        scores
            .iter()
            .map(|&s| tracker.update(&calm_face(s)).flags.excessive_movement)
            .collect()
    }

    #[test]
    fn test_movement_needs_five_consecutive_frames() {
        let mut t = tracker();
        let states = feed(&mut t, &[HIGH; 5]);
        assert_eq!(states, vec![false, false, false, false, true]);
        assert_eq!(t.counters().consecutive_movement_frames, 5);
    }

    #[test]
    fn test_movement_releases_after_ten_stable_frames() {
        let mut t = tracker();
        feed(&mut t, &[HIGH; 6]);
        assert!(t.flags().excessive_movement);

        let states = feed(&mut t, &[LOW; 10]);
        assert!(states[..9].iter().all(|&s| s), "Flag must hold for 9 calm frames");
        assert!(!states[9], "Flag must drop on the 10th calm frame");
    }

    #[test]
    fn test_interrupted_sequences_never_trigger() {
        for run in 1..5 {
            let mut t = tracker();
            let mut scores = Vec::new();
            for _ in 0..8 {
                scores.extend(std::iter::repeat(HIGH).take(run));
                scores.extend(std::iter::repeat(LOW).take(run));
            }
            let states = feed(&mut t, &scores);
            assert!(
                states.iter().all(|&s| !s),
                "Runs of {} high frames should never confirm movement",
                run
            );
        }
    }

    #[test]
    fn test_single_spike_resets_stability() {
        let mut t = tracker();
        feed(&mut t, &[HIGH; 5]);
        feed(&mut t, &[LOW; 9]);
        assert!(t.flags().excessive_movement);

        feed(&mut t, &[HIGH]);
        assert_eq!(t.counters().consecutive_stable_frames, 0);

        let states = feed(&mut t, &[LOW; 9]);
        assert!(states.iter().all(|&s| s), "Stability count restarted after spike");
        assert!(!feed(&mut t, &[LOW])[0]);
    }

    #[test]
    fn test_weighted_average_gates_confirmation() {
        let mut t = tracker();
        feed(&mut t, &[0; 10]);
        let states = feed(&mut t, &[500_001; 5]);

        assert_eq!(t.counters().consecutive_movement_frames, 5);
        assert!(t.weighted_movement() < 500_000.0);
        assert!(states.iter().all(|&s| !s), "Diluted average must block the flag");
    }

    #[test]
    fn test_weighted_average_favours_recent() {
        let mut t = tracker();
        feed(&mut t, &[0, 100]);
        // weights [0.1, 1.0] → 100 / 1.1
        assert!((t.weighted_movement() - 100.0 / 1.1).abs() < 1e-9);

        let mut single = tracker();
        feed(&mut single, &[42]);
        assert!((single.weighted_movement() - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_frames_cannot_confirm_movement() {
        let mut t = tracker();
        let states = feed(&mut t, &[0; 40]);
        assert!(states.iter().all(|&s| !s));
        assert_eq!(t.counters().consecutive_movement_frames, 0);
    }

    #[test]
    fn test_first_frame_skips_movement() {
        let mut t = tracker();
        let update = t.update(&FrameFacts {
            face_count: 1,
            eyes_detected: Some(2),
            movement: None,
        });
        assert!(update.weighted_movement.is_none());
        assert!(t.movement_history().is_empty());
        assert_eq!(t.counters(), DebounceCounters::default());
    }

    #[test]
    fn test_history_capacities() {
        let mut t = tracker();
        let scores: Vec<u64> = (0..50).collect();
        feed(&mut t, &scores);

        assert_eq!(t.movement_history(), (35..50).collect::<Vec<u64>>());
        assert_eq!(t.stable_history().len(), 30);
    }

    #[test]
    fn test_eye_failures_debounced() {
        let mut t = tracker();
        let blind = FrameFacts {
            face_count: 1,
            eyes_detected: Some(0),
            movement: None,
        };

        for i in 1..5 {
            let update = t.update(&blind);
            assert!(!update.flags.no_eyes, "Flag raised early on failure {}", i);
        }
        let update = t.update(&blind);
        assert!(update.flags.no_eyes);
        assert_eq!(t.counters().eye_failure_count, 5);
        assert!(update.warnings.iter().any(|w| w.contains("5 consecutive frames")));

        let update = t.update(&calm_face(0));
        assert!(!update.flags.no_eyes);
        assert_eq!(t.counters().eye_failure_count, 0);
    }

    #[test]
    fn test_face_count_flags_are_direct() {
        let mut t = tracker();

        let update = t.update(&FrameFacts {
            face_count: 2,
            eyes_detected: Some(2),
            movement: None,
        });
        assert!(update.flags.multiple_faces && !update.flags.no_face);

        let update = t.update(&FrameFacts::default());
        assert!(update.flags.no_face && !update.flags.multiple_faces);
        assert_eq!(update.flags.reason(), "no_face");

        let update = t.update(&calm_face(0));
        assert!(!update.flags.any());
        assert_eq!(update.flags.reason(), "");
    }

    #[test]
    fn test_no_face_leaves_eye_counter_alone() {
        let mut t = tracker();
        let blind = FrameFacts {
            face_count: 1,
            eyes_detected: Some(0),
            movement: None,
        };
        t.update(&blind);
        t.update(&blind);
        t.update(&FrameFacts::default());
        assert_eq!(t.counters().eye_failure_count, 2);
    }

    #[test]
    fn test_reason_order_is_fixed() {
        let flags = HysteresisFlags {
            multiple_faces: true,
            no_face: false,
            no_eyes: true,
            excessive_movement: true,
        };
        assert_eq!(flags.reason(), "multiple_faces, no_eyes, excessive_movement");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut t = tracker();
        feed(&mut t, &[HIGH; 6]);
        t.update(&FrameFacts {
            face_count: 1,
            eyes_detected: Some(0),
            movement: None,
        });

        t.reset();
        assert_eq!(t.flags(), HysteresisFlags::default());
        assert_eq!(t.counters(), DebounceCounters::default());
        assert!(t.movement_history().is_empty());
        assert!(t.stable_history().is_empty());
    }

    proptest! {
        /// Rises only with a confirmed counter and a weighted average above
        /// threshold; falls only after ten calm frames in a row.
        #[test]
        fn prop_movement_flag_transitions(highs in prop::collection::vec(any::<bool>(), 1..120)) {
            let mut t = tracker();
            let mut previous = false;

            for (i, &high) in highs.iter().enumerate() {
                let update = t.update(&calm_face(if high { HIGH } else { LOW }));
                let now = update.flags.excessive_movement;
                let counters = t.counters();

                if now && !previous {
                    prop_assert!(high, "Rose on a calm frame at {}", i);
                    prop_assert!(counters.consecutive_movement_frames >= 5);
                    prop_assert!(highs[..=i].iter().filter(|&&h| h).count() >= 5);
                    prop_assert!(update.weighted_movement.unwrap_or(0.0) > 500_000.0);
                }
                if previous && !now {
                    prop_assert!(counters.consecutive_stable_frames >= 10);
                    prop_assert!(highs[i + 1 - 10..=i].iter().all(|&h| !h), "Fell early at {}", i);
                }

                let window = &highs[i + 1 - (i + 1).min(15)..=i];
                if window.len() >= 5 && window.iter().all(|&h| h) {
                    prop_assert!(now, "Sustained movement must be flagged at {}", i);
                }
                if i >= 9 && highs[i - 9..=i].iter().all(|&h| !h) {
                    prop_assert!(!now, "Ten calm frames must clear the flag at {}", i);
                }
                previous = now;
            }
        }

        #[test]
        fn prop_histories_bounded_oldest_first(scores in prop::collection::vec(0u64..2_000_000, 0..100)) {
            let mut t = tracker();
            feed(&mut t, &scores);

            let history = t.movement_history();
            prop_assert!(history.len() <= 15);
            prop_assert!(t.stable_history().len() <= 30);

            let kept = &scores[scores.len() - scores.len().min(15)..];
            prop_assert_eq!(history, kept.to_vec());
            let calm: Vec<bool> = scores[scores.len() - scores.len().min(30)..]
                .iter()
                .map(|&s| s < 500_000)
                .collect();
            prop_assert_eq!(t.stable_history(), calm);
        }
    }
}
