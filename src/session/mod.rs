// src/session/mod.rs
//
// Session layer: violation bookkeeping, terminal reports, the registry of
// active sessions and the async runner that ties them to a frame stream.

pub mod messages;
pub mod registry;
pub mod report;
pub mod runner;
pub mod violations;

pub use messages::OutboundMessage;
pub use registry::{SessionEntry, SessionGuard, SessionKey, SessionRegistry, SessionStatus};
pub use report::{list_reports, load_report, JsonFileReportSink, ReportSink, ReportSummary, SessionReport};
pub use runner::{DetectorFactory, Monitor, MonitorSession, SessionEnd};
pub use violations::{ViolationRecord, ViolationTracker};
