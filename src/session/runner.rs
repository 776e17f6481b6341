// src/session/runner.rs
//
// Session runtime. A Monitor hands out one MonitorSession per
// (student, exam); each session owns its analyzer and violation tracker
// outright and shares nothing with other sessions except the registry.
//
// Frame analysis is CPU-bound, so it runs on the blocking pool. Frames are
// handled strictly in arrival order, one at a time, and each one produces
// exactly one outbound message. A frame that misses its deadline is
// reported as an error and its late result is thrown away.

use super::messages::OutboundMessage;
use super::registry::{SessionEntry, SessionGuard, SessionKey, SessionRegistry, SessionStatus};
use super::report::{ReportSink, SessionReport};
use super::violations::ViolationTracker;
use crate::detection::FaceLocator;
use crate::error::{FrameError, SessionError};
use crate::pipeline::{
    FrameAnalyzer, FrameFailure, FrameOutcome, GatheredFrame, PerformanceSnapshot, VerdictDetails,
};
use crate::types::Config;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Builds a fresh, independent analyzer for every new session.
#[derive(Clone)]
pub struct DetectorFactory {
    config: Arc<Config>,
    locator: Arc<dyn FaceLocator>,
}

impl DetectorFactory {
    pub fn new(config: Arc<Config>, locator: Arc<dyn FaceLocator>) -> Self {
        Self { config, locator }
    }

    pub fn create(&self) -> FrameAnalyzer {
        FrameAnalyzer::new(&self.config, Arc::clone(&self.locator))
    }
}

pub struct Monitor {
    config: Arc<Config>,
    factory: DetectorFactory,
    sink: Arc<dyn ReportSink>,
    registry: SessionRegistry,
}

impl Monitor {
    pub fn new(config: Config, locator: Arc<dyn FaceLocator>, sink: Arc<dyn ReportSink>) -> Self {
        let config = Arc::new(config);
        Self {
            factory: DetectorFactory::new(Arc::clone(&config), locator),
            config,
            sink,
            registry: SessionRegistry::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn active_sessions(&self) -> Vec<SessionEntry> {
        self.registry.active_sessions()
    }

    /// Register a session and build its private analysis state.
    pub fn start_session(&self, student_id: &str, exam_id: &str) -> Result<MonitorSession, SessionError> {
        let guard = self.registry.register(SessionKey::new(student_id, exam_id))?;
        info!("Monitoring started for student {} in exam {}", student_id, exam_id);

        Ok(MonitorSession {
            guard,
            slot: AnalyzerSlot::Idle(self.factory.create()),
            factory: self.factory.clone(),
            violations: ViolationTracker::new(self.config.violations.max_violations),
            sink: Arc::clone(&self.sink),
            frame_timeout: self.config.session.frame_timeout_ms.map(Duration::from_millis),
        })
    }
}

#[derive(Debug)]
pub enum SessionEnd {
    /// Violation threshold reached; the report was handed to the sink
    Terminated(SessionReport),
    /// Either side of the connection went away first; no report
    Disconnected { violations: u32 },
}

type GatherTask = JoinHandle<(FrameAnalyzer, Result<GatheredFrame, FrameError>)>;

/// Where the session's analyzer currently lives. It moves onto the blocking
/// pool for the gather half of each frame and comes back for the commit.
enum AnalyzerSlot {
    Idle(FrameAnalyzer),
    /// Gather for a timed-out frame still running; its result is discarded
    Abandoned(GatherTask),
    Vacant,
}

pub struct MonitorSession {
    guard: SessionGuard,
    slot: AnalyzerSlot,
    factory: DetectorFactory,
    violations: ViolationTracker,
    sink: Arc<dyn ReportSink>,
    frame_timeout: Option<Duration>,
}

impl MonitorSession {
    pub fn key(&self) -> &SessionKey {
        self.guard.key()
    }

    pub fn violations(&self) -> &ViolationTracker {
        &self.violations
    }

    /// Analyzer snapshot. Waits for an abandoned frame to drain first.
    pub async fn performance(&mut self) -> PerformanceSnapshot {
        let analyzer = self.take_analyzer().await;
        let snapshot = analyzer.performance();
        self.slot = AnalyzerSlot::Idle(analyzer);
        snapshot
    }

    /// Get the analyzer back, waiting out any abandoned gather. At most one
    /// frame is ever in flight.
    async fn take_analyzer(&mut self) -> FrameAnalyzer {
        match std::mem::replace(&mut self.slot, AnalyzerSlot::Vacant) {
            AnalyzerSlot::Idle(analyzer) => analyzer,
            AnalyzerSlot::Abandoned(task) => match task.await {
                Ok((analyzer, _late)) => {
                    debug!("Dropped late result for {}/{}", self.key().student_id, self.key().exam_id);
                    analyzer
                }
                Err(e) => {
                    error!("Analysis worker lost ({}), starting a fresh analyzer", e);
                    self.factory.create()
                }
            },
            AnalyzerSlot::Vacant => self.factory.create(),
        }
    }

    /// Analyze one frame. The gather half runs on the blocking pool under
    /// the frame timeout; only a gather that finishes in time is committed.
    pub async fn process_frame(&mut self, bytes: Vec<u8>) -> FrameOutcome {
        let analyzer = self.take_analyzer().await;
        let started = Instant::now();

        let mut task: GatherTask = tokio::task::spawn_blocking(move || {
            let gathered = panic::catch_unwind(AssertUnwindSafe(|| analyzer.gather(&bytes)))
                .unwrap_or_else(|_| Err(FrameError::Worker("frame analysis panicked".to_string())));
            (analyzer, gathered)
        });

        let joined = match self.frame_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    self.slot = AnalyzerSlot::Abandoned(task);
                    return Err(FrameFailure {
                        error: FrameError::Timeout(limit.as_millis() as u64),
                        details: VerdictDetails {
                            processing_time: started.elapsed().as_secs_f64(),
                            ..Default::default()
                        },
                    });
                }
            },
            None => task.await,
        };

        let (mut analyzer, gathered) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                self.slot = AnalyzerSlot::Idle(self.factory.create());
                return Err(FrameFailure {
                    error: FrameError::Worker(e.to_string()),
                    details: VerdictDetails::default(),
                });
            }
        };

        let outcome = match gathered {
            Ok(gathered) => Ok(analyzer.commit(gathered, started)),
            Err(error) => Err(analyzer.fail(error, started.elapsed())),
        };
        self.slot = AnalyzerSlot::Idle(analyzer);
        outcome
    }

    /// Drive the session until termination or disconnect.
    pub async fn run(
        mut self,
        mut frames: mpsc::Receiver<Vec<u8>>,
        outbound: mpsc::Sender<OutboundMessage>,
    ) -> SessionEnd {
        let key = self.key().clone();

        while let Some(bytes) = frames.recv().await {
            let message = match self.process_frame(bytes).await {
                Err(failure) => {
                    warn!(
                        "Frame failed for {}/{} ({}): {}",
                        key.student_id,
                        key.exam_id,
                        failure.error.kind(),
                        failure.error
                    );
                    OutboundMessage::error()
                }
                Ok(verdict) => match self.violations.record(&verdict) {
                    Some(_) if self.violations.should_terminate() => {
                        return self.terminate(&outbound).await;
                    }
                    Some(count) => {
                        warn!(
                            "Violation {}/{} for {}/{}: {}",
                            count,
                            self.violations.max_violations(),
                            key.student_id,
                            key.exam_id,
                            verdict.reason
                        );
                        OutboundMessage::warning(
                            count,
                            self.violations.max_violations(),
                            &verdict.reason,
                            verdict.details,
                        )
                    }
                    None => OutboundMessage::status(self.violations.violation_count()),
                },
            };

            debug!("Sending {} to {}/{}", message.kind(), key.student_id, key.exam_id);
            if outbound.send(message).await.is_err() {
                info!("Outbound channel closed for {}/{}", key.student_id, key.exam_id);
                return self.disconnected().await;
            }
        }

        info!("Frame stream ended for {}/{}", key.student_id, key.exam_id);
        self.disconnected().await
    }

    async fn terminate(self, outbound: &mpsc::Sender<OutboundMessage>) -> SessionEnd {
        let key = self.key().clone();
        let count = self.violations.violation_count();
        self.guard.set_status(SessionStatus::Terminated);

        let report = SessionReport::build(&key.student_id, &key.exam_id, &self.violations);
        let sink = Arc::clone(&self.sink);
        let to_deliver = report.clone();
        let delivered = tokio::task::spawn_blocking(move || sink.deliver(&to_deliver)).await;

        let reference = match delivered {
            Ok(Ok(reference)) => reference,
            Ok(Err(e)) => {
                error!("Failed to deliver report for {}/{}: {:#}", key.student_id, key.exam_id, e);
                report.reference_name()
            }
            Err(e) => {
                error!("Report delivery task failed for {}/{}: {}", key.student_id, key.exam_id, e);
                report.reference_name()
            }
        };

        error!(
            "Exam terminated for {}/{} after {} violations",
            key.student_id, key.exam_id, count
        );
        if outbound
            .send(OutboundMessage::termination(count, reference))
            .await
            .is_err()
        {
            warn!("Termination notice not delivered to {}/{}", key.student_id, key.exam_id);
        }

        SessionEnd::Terminated(report)
    }

    async fn disconnected(mut self) -> SessionEnd {
        let snapshot = self.performance().await;
        info!(
            "Session {}/{} closed: {} frames, {:.1} fps, {} failed",
            self.key().student_id,
            self.key().exam_id,
            snapshot.total_frames,
            snapshot.fps,
            snapshot.metrics.frames_failed
        );
        SessionEnd::Disconnected {
            violations: self.violations.violation_count(),
        }
    }
}
