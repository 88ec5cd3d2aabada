//! Lifecycle events emitted by the orchestrator.
//!
//! Events are fire-and-forget: sinks are called through
//! [`EventSink::try_emit`] and a misbehaving sink never affects a run.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Emitted once the input is validated and the context exists.
pub const ANALYSIS_STARTED: &str = "analysis.started";
/// Emitted once when the run's cancellation token fires mid-run.
pub const ANALYSIS_CANCELLED: &str = "analysis.cancelled";
/// Emitted after the context is finalized.
pub const ANALYSIS_COMPLETED: &str = "analysis.completed";
/// A stage was dispatched.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage produced its output.
pub const STAGE_SUCCEEDED: &str = "stage.succeeded";
/// A stage failed, timed out or was cancelled mid-flight.
pub const STAGE_FAILED: &str = "stage.failed";
/// A stage was never dispatched.
pub const STAGE_SKIPPED: &str = "stage.skipped";
