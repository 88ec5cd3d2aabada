//! Bid strategy derived from the score breakdown.

use super::GapSeverity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strengths, weaknesses, opportunities and threats.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Swot {
    /// Criteria where we out-fit the strongest competitor.
    pub strengths: Vec<String>,
    /// Criteria where a competitor out-fits us.
    pub weaknesses: Vec<String>,
    /// Openings competitors leave.
    pub opportunities: Vec<String>,
    /// External risks to the bid.
    pub threats: Vec<String>,
}

/// Kind of remedial action attached to a mitigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Ask the issuer to clarify the requirement.
    SpecClarification,
    /// Staff up or train internally.
    InternalReinforcement,
    /// Bring in a partner who has the capability.
    ExternalPartner,
    /// Offer a proof of concept to demonstrate capability.
    ProofOfConcept,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpecClarification => write!(f, "spec clarification"),
            Self::InternalReinforcement => write!(f, "internal reinforcement"),
            Self::ExternalPartner => write!(f, "external partner"),
            Self::ProofOfConcept => write!(f, "proof of concept"),
        }
    }
}

/// A concrete action backing a mitigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    /// Criterion the action addresses.
    pub criterion: String,
    /// What to do.
    pub action: ActionType,
    /// The (negative) contribution being addressed.
    pub contribution: f64,
}

/// An action closing a skill gap on one mandatory requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapAction {
    /// Requirement left uncovered.
    pub requirement_id: String,
    /// Weak or missing coverage.
    pub severity: GapSeverity,
    /// What to do.
    pub action: ActionType,
    /// Human-readable description.
    pub message: String,
}

/// Output of the strategy synthesizer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Strategy {
    /// Messages for criteria with positive contribution, largest first.
    pub differentiators: Vec<String>,
    /// Messages for criteria with negative contribution, largest gap first.
    pub mitigations: Vec<String>,
    /// Actions aligned index-for-index with `mitigations`.
    #[serde(default)]
    pub actions: Vec<ActionItem>,
    /// Actions for mandatory requirements no past project covers.
    #[serde(default)]
    pub gap_actions: Vec<GapAction>,
    /// SWOT view.
    pub swot: Swot,
    /// General recommendations for the bid team.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Free-text executive narrative, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

impl Strategy {
    /// Action types used across all mitigations.
    #[must_use]
    pub fn action_types(&self) -> Vec<ActionType> {
        let mut types: Vec<ActionType> = Vec::new();
        for item in &self.actions {
            if !types.contains(&item.action) {
                types.push(item.action);
            }
        }
        types
    }
}
