//! Stage names and the status state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The analysis stages, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// Turns raw RFP text into requirements, criteria and risk flags.
    Extraction,
    /// Ranks past projects against the requirements.
    InternalMatcher,
    /// Builds per-competitor profiles.
    CompetitorProfiler,
    /// Computes the win probability.
    Scoring,
    /// Derives differentiators, mitigations and SWOT.
    Strategy,
}

impl StageName {
    /// All stages in dependency order.
    pub const ALL: [Self; 5] = [
        Self::Extraction,
        Self::InternalMatcher,
        Self::CompetitorProfiler,
        Self::Scoring,
        Self::Strategy,
    ];

    /// Stages that cannot run if this stage fails.
    #[must_use]
    pub fn hard_dependents(self) -> &'static [Self] {
        match self {
            Self::Extraction => &[
                Self::InternalMatcher,
                Self::CompetitorProfiler,
                Self::Scoring,
                Self::Strategy,
            ],
            Self::Scoring => &[Self::Strategy],
            // Scoring treats a failed matcher or profiler as zero information.
            Self::InternalMatcher | Self::CompetitorProfiler | Self::Strategy => &[],
        }
    }

    /// Stages that must be terminal before this stage may start.
    #[must_use]
    pub fn upstream(self) -> &'static [Self] {
        match self {
            Self::Extraction => &[],
            Self::InternalMatcher | Self::CompetitorProfiler => &[Self::Extraction],
            Self::Scoring => &[
                Self::Extraction,
                Self::InternalMatcher,
                Self::CompetitorProfiler,
            ],
            Self::Strategy => &[Self::Scoring],
        }
    }

    /// Returns the snake_case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::InternalMatcher => "internal_matcher",
            Self::CompetitorProfiler => "competitor_profiler",
            Self::Scoring => "scoring",
            Self::Strategy => "strategy",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The execution status of a stage.
///
/// `Pending -> Running -> {Succeeded, Failed}`; `Skipped` is only reachable
/// from `Pending`. Nothing moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not been scheduled.
    #[default]
    Pending,
    /// Stage has been dispatched.
    Running,
    /// Stage completed and its output was applied.
    Succeeded,
    /// Stage failed, timed out or was cancelled mid-flight.
    Failed,
    /// Stage never ran because a hard dependency failed or the run was cancelled.
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns true if moving to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Skipped)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_display() {
        assert_eq!(StageName::Extraction.to_string(), "extraction");
        assert_eq!(StageName::InternalMatcher.to_string(), "internal_matcher");
        assert_eq!(StageName::CompetitorProfiler.to_string(), "competitor_profiler");
    }

    #[test]
    fn test_extraction_dependents_cover_every_other_stage() {
        let dependents = StageName::Extraction.hard_dependents();
        assert_eq!(dependents.len(), StageName::ALL.len() - 1);
        assert!(StageName::InternalMatcher.hard_dependents().is_empty());
        assert_eq!(StageName::Scoring.hard_dependents(), &[StageName::Strategy]);
    }

    #[test]
    fn test_scoring_waits_for_all_three_producers() {
        assert!(StageName::Extraction.upstream().is_empty());
        assert_eq!(StageName::Scoring.upstream().len(), 3);
        assert_eq!(StageName::Strategy.upstream(), &[StageName::Scoring]);
    }

    #[test]
    fn test_stage_status_is_terminal() {
        assert!(StageStatus::Succeeded.is_terminal());
        assert!(StageStatus::Skipped.is_terminal());
        assert!(StageStatus::Failed.is_terminal());
        assert!(!StageStatus::Pending.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_transitions_only_move_forward() {
        assert!(StageStatus::Pending.can_transition_to(StageStatus::Running));
        assert!(StageStatus::Pending.can_transition_to(StageStatus::Skipped));
        assert!(StageStatus::Running.can_transition_to(StageStatus::Failed));
        assert!(StageStatus::Running.can_transition_to(StageStatus::Succeeded));

        assert!(!StageStatus::Running.can_transition_to(StageStatus::Skipped));
        assert!(!StageStatus::Pending.can_transition_to(StageStatus::Succeeded));
        assert!(!StageStatus::Succeeded.can_transition_to(StageStatus::Running));
        assert!(!StageStatus::Failed.can_transition_to(StageStatus::Pending));
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::Succeeded).unwrap();
        assert_eq!(json, r#""succeeded""#);

        let name: StageName = serde_json::from_str(r#""competitor_profiler""#).unwrap();
        assert_eq!(name, StageName::CompetitorProfiler);
    }
}
