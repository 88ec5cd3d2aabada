//! Per-stage execution record.

use super::StageStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one stage during a run.
///
/// The record is the authoritative explanation for the presence or absence of
/// that stage's output fields in the analysis context.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StageRecord {
    /// Current status.
    pub status: StageStatus,
    /// Failure or skip reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Error class tag for failures (e.g. "RetrievalError").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// When the stage was dispatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the stage reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall time between dispatch and completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

impl StageRecord {
    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns a short human readable description.
    #[must_use]
    pub fn describe(&self) -> String {
        match (&self.status, &self.reason) {
            (StageStatus::Failed, Some(reason)) => format!("failed ({reason})"),
            (StageStatus::Skipped, Some(reason)) => format!("skipped ({reason})"),
            (status, _) => status.to_string(),
        }
    }
}
