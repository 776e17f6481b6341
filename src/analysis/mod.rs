// src/analysis/mod.rs
//
// Temporal analysis for one session.
//
// Signal flow:
//   GrayFrame (t-1, t) → movement ──┐
//   face / eye counts ──────────────┼→ hysteresis → HysteresisFlags
//
// Both stateful pieces (MovementEstimator, HysteresisTracker) are owned by
// exactly one session's FrameAnalyzer.

pub mod frame;
pub mod history;
pub mod hysteresis;
pub mod movement;

pub use frame::GrayFrame;
pub use history::RingBuffer;
pub use hysteresis::{
    BehaviorFlag, DebounceCounters, FrameFacts, HysteresisFlags, HysteresisTracker, HysteresisUpdate,
};
pub use movement::{movement_between, MovementEstimator, MovementSample};
