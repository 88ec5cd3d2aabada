//! Competitor profiles.

use super::{text_tokens, Requirement};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a competitor usually prices its bids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricePositioning {
    /// Above market.
    Premium,
    /// Market rate.
    Standard,
    /// Below market.
    Low,
    /// No data.
    #[default]
    Unknown,
}

impl PricePositioning {
    /// Parses a free-form label; anything unrecognized is `Unknown`.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "premium" | "high" => Self::Premium,
            "standard" | "market" | "medium" => Self::Standard,
            "low" | "budget" | "aggressive" => Self::Low,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for PricePositioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Premium => write!(f, "premium"),
            Self::Standard => write!(f, "standard"),
            Self::Low => write!(f, "low"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// What is known about one competitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorProfile {
    /// Capability keywords or phrases.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Pricing behaviour.
    #[serde(default)]
    pub price_positioning: PricePositioning,
    /// Historical win record in `[0, 1]`.
    #[serde(default)]
    pub track_record_score: f64,
    /// Known strengths.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strengths: Vec<String>,
    /// Known weaknesses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weaknesses: Vec<String>,
    /// False for the sentinel produced when lookup failed.
    pub known: bool,
}

impl CompetitorProfile {
    /// The sentinel profile for a competitor that could not be looked up.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            capabilities: Vec::new(),
            price_positioning: PricePositioning::Unknown,
            track_record_score: 0.0,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            known: false,
        }
    }

    /// Returns true for the sentinel profile.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        !self.known
    }

    /// Share of `requirements` covered by at least one capability, in `[0, 1]`.
    ///
    /// A capability covers a requirement when every token of the capability
    /// appears in the requirement text.
    #[must_use]
    pub fn capability_overlap(&self, requirements: &[&Requirement]) -> f64 {
        if self.is_unknown() || requirements.is_empty() {
            return 0.0;
        }
        let capabilities: Vec<_> = self
            .capabilities
            .iter()
            .map(|c| text_tokens(c))
            .filter(|t| !t.is_empty())
            .collect();
        if capabilities.is_empty() {
            return 0.0;
        }

        let covered = requirements
            .iter()
            .filter(|req| {
                let tokens = text_tokens(&req.text);
                capabilities.iter().any(|cap| cap.is_subset(&tokens))
            })
            .count();

        #[allow(clippy::cast_precision_loss)]
        let overlap = covered as f64 / requirements.len() as f64;
        overlap.clamp(0.0, 1.0)
    }
}
