//! Win-probability breakdown.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Score components for one evaluation criterion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriterionScore {
    /// Criterion weight (normalized).
    pub weight: f64,
    /// Our fit in `[0, 1]`.
    pub fit_score: f64,
    /// Strongest competitor's edge in `[0, 1]`.
    pub competitor_advantage: f64,
    /// `weight × (fit − advantage)`, clamped to `[-weight, weight]`.
    pub contribution: f64,
    /// False when neither internal matches nor competitor data say anything
    /// about this criterion.
    pub resolved: bool,
}

impl CriterionScore {
    /// `fit_score − competitor_advantage`.
    #[must_use]
    pub fn differential(&self) -> f64 {
        self.fit_score - self.competitor_advantage
    }
}

/// How hard the bid looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Probability at or above 0.7.
    Low,
    /// Probability at or above 0.4.
    Medium,
    /// Probability below 0.4.
    High,
}

impl Difficulty {
    /// Bands a win probability.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 0.7 {
            Self::Low
        } else if probability >= 0.4 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Output of the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Win probability in `[0, 1]`.
    pub overall_probability: f64,
    /// Per-criterion components, keyed by criterion name.
    pub per_criterion: BTreeMap<String, CriterionScore>,
    /// Difficulty band derived from the probability.
    pub difficulty: Difficulty,
    /// How much the estimate can be trusted, in `[0, 1]`.
    pub confidence: f64,
    /// Criteria that move the probability most, largest first.
    pub key_drivers: Vec<String>,
}

impl ScoreBreakdown {
    /// Returns the score for a criterion.
    #[must_use]
    pub fn criterion(&self, name: &str) -> Option<&CriterionScore> {
        self.per_criterion.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_bands() {
        assert_eq!(Difficulty::from_probability(1.0), Difficulty::Low);
        assert_eq!(Difficulty::from_probability(0.7), Difficulty::Low);
        assert_eq!(Difficulty::from_probability(0.5), Difficulty::Medium);
        assert_eq!(Difficulty::from_probability(0.39), Difficulty::High);
    }

    #[test]
    fn test_differential() {
        let score = CriterionScore {
            weight: 0.5,
            fit_score: 0.8,
            competitor_advantage: 0.3,
            contribution: 0.25,
            resolved: true,
        };
        assert!((score.differential() - 0.5).abs() < 1e-12);
    }
}
