//! Scoring engine: weighted win probability.
//!
//! For every criterion `c` with weight `w`:
//!
//! - `fit(c)` is the mean, over internal matches linked to a requirement
//!   under `c`, of each match's best similarity on those requirements only,
//!   or 0 without such matches;
//! - `advantage(c)` is the largest capability overlap any known competitor
//!   has with the requirements under `c`, or 0 without competitor data;
//! - `contribution(c) = w × (fit − advantage)`, clamped to `[-w, w]`.
//!
//! The win probability is `0.5 + Σ contribution`, clamped to `[0, 1]`.
//! Criteria are visited in name order so the sum does not depend on the
//! order in which they were extracted.

use super::AnalysisStage;
use crate::context::AnalysisContext;
use crate::core::StageName;
use crate::errors::StageError;
use crate::model::{
    CompetitorProfile, CriterionScore, Difficulty, EvaluationCriteria, MatchResult, Requirement,
    ScoreBreakdown,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

/// Probability with no information either way.
pub const PRIOR: f64 = 0.5;

const MAX_KEY_DRIVERS: usize = 5;

/// Everything the engine reads.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    /// Extracted requirements.
    pub requirements: &'a [Requirement],
    /// Normalized criteria.
    pub criteria: &'a EvaluationCriteria,
    /// Ranked internal matches; empty when the matcher failed.
    pub matches: &'a [MatchResult],
    /// Competitor profiles; empty when the profiler failed.
    pub profiles: &'a BTreeMap<String, CompetitorProfile>,
    /// Risk flags, used for the confidence estimate.
    pub risk_flags: &'a BTreeSet<String>,
}

/// Computes the score breakdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    /// Creates the engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Scores the bid. Fails only when there are no criteria.
    #[instrument(skip_all, fields(criteria = input.criteria.len()))]
    pub fn score(&self, input: &ScoringInput<'_>) -> Result<ScoreBreakdown, StageError> {
        if input.criteria.is_empty() {
            return Err(StageError::Scoring(
                "no evaluation criteria to score against".to_string(),
            ));
        }

        let known: Vec<&CompetitorProfile> =
            input.profiles.values().filter(|p| p.known).collect();

        let mut per_criterion = BTreeMap::new();
        let mut total = 0.0;
        for (name, weight) in input.criteria.iter() {
            let score = score_criterion(input, &known, name, weight);
            total += score.contribution;
            per_criterion.insert(name.to_string(), score);
        }

        let overall_probability = (PRIOR + total).clamp(0.0, 1.0);
        let breakdown = ScoreBreakdown {
            overall_probability,
            difficulty: Difficulty::from_probability(overall_probability),
            confidence: confidence(input.criteria.len(), input.risk_flags.len()),
            key_drivers: key_drivers(&per_criterion),
            per_criterion,
        };
        debug!(
            probability = breakdown.overall_probability,
            difficulty = %breakdown.difficulty,
            "bid scored"
        );
        Ok(breakdown)
    }
}

fn score_criterion(
    input: &ScoringInput<'_>,
    known: &[&CompetitorProfile],
    name: &str,
    weight: f64,
) -> CriterionScore {
    let under: Vec<&Requirement> = input
        .requirements
        .iter()
        .filter(|r| r.is_under(name))
        .collect();
    let ids: BTreeSet<&str> = under.iter().map(|r| r.id.as_str()).collect();

    let similarities: Vec<f64> = input
        .matches
        .iter()
        .filter_map(|m| m.best_score_among(&ids))
        .map(|score| score.clamp(0.0, 1.0))
        .collect();
    let fit_score = mean(&similarities);

    let competitor_advantage = known
        .iter()
        .map(|p| p.capability_overlap(&under))
        .fold(0.0, f64::max);

    let contribution = (weight * (fit_score - competitor_advantage)).clamp(-weight, weight);
    let resolved = !similarities.is_empty() || (!under.is_empty() && !known.is_empty());

    CriterionScore {
        weight,
        fit_score,
        competitor_advantage,
        contribution,
        resolved,
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Mean of criteria coverage (`min(1, n/5)`) and a risk penalty
/// (`max(0.3, 1 − 0.1 × risks)`).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn confidence(criteria: usize, risks: usize) -> f64 {
    let coverage = (criteria as f64 / 5.0).min(1.0);
    let risk = (1.0 - 0.1 * risks as f64).max(0.3);
    (coverage + risk) / 2.0
}

fn key_drivers(per_criterion: &BTreeMap<String, CriterionScore>) -> Vec<String> {
    let mut drivers: Vec<(&String, f64)> = per_criterion
        .iter()
        .filter(|(_, s)| s.contribution != 0.0)
        .map(|(name, s)| (name, s.contribution.abs()))
        .collect();
    drivers.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    drivers
        .into_iter()
        .take(MAX_KEY_DRIVERS)
        .map(|(name, _)| name.clone())
        .collect()
}

#[async_trait]
impl AnalysisStage for ScoringEngine {
    type Output = ScoreBreakdown;

    fn name(&self) -> StageName {
        StageName::Scoring
    }

    async fn execute(&self, ctx: &AnalysisContext) -> Result<Self::Output, StageError> {
        let empty_criteria = EvaluationCriteria::default();
        let no_profiles = BTreeMap::new();
        let input = ScoringInput {
            requirements: ctx.requirements(),
            criteria: ctx.evaluation_criteria().unwrap_or(&empty_criteria),
            matches: ctx.internal_matches().unwrap_or(&[]),
            profiles: ctx.competitor_profiles().unwrap_or(&no_profiles),
            risk_flags: ctx.risk_flags(),
        };
        self.score(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PricePositioning;
    use pretty_assertions::assert_eq;

    fn competitor(capabilities: &[&str]) -> CompetitorProfile {
        CompetitorProfile {
            capabilities: capabilities.iter().map(ToString::to_string).collect(),
            price_positioning: PricePositioning::Standard,
            track_record_score: 0.5,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            known: true,
        }
    }

    fn requirements() -> Vec<Requirement> {
        vec![
            Requirement::new("REQ-001", "Kubernetes platform build", "Technical", true)
                .with_criterion("Technical"),
            Requirement::new("REQ-002", "Fixed price delivery", "Price", true).with_criterion("Price"),
        ]
    }

    fn score(
        criteria: &EvaluationCriteria,
        matches: &[MatchResult],
        profiles: &BTreeMap<String, CompetitorProfile>,
    ) -> ScoreBreakdown {
        let reqs = requirements();
        let risks = BTreeSet::new();
        ScoringEngine::new()
            .score(&ScoringInput {
                requirements: &reqs,
                criteria,
                matches,
                profiles,
                risk_flags: &risks,
            })
            .unwrap()
    }

    #[test]
    fn test_no_information_is_exactly_prior() {
        let criteria = EvaluationCriteria::from_weights([("Technical", 0.6), ("Price", 0.4)]).unwrap();
        let breakdown = score(&criteria, &[], &BTreeMap::new());

        assert_eq!(breakdown.overall_probability, 0.5);
        assert!(breakdown.key_drivers.is_empty());
        assert!(breakdown.per_criterion.values().all(|s| !s.resolved));
    }

    #[test]
    fn test_worked_example() {
        let criteria = EvaluationCriteria::from_weights([("Technical", 0.6), ("Price", 0.4)]).unwrap();
        let matches = vec![MatchResult::new("P-1", 0.9).covering(["REQ-001"])];
        let breakdown = score(&criteria, &matches, &BTreeMap::new());

        let technical = breakdown.criterion("Technical").unwrap();
        assert!((technical.fit_score - 0.9).abs() < 1e-12);
        assert_eq!(technical.competitor_advantage, 0.0);
        assert!((technical.contribution - 0.54).abs() < 1e-12);

        let price = breakdown.criterion("Price").unwrap();
        assert_eq!(price.fit_score, 0.0);
        assert_eq!(price.contribution, 0.0);

        assert_eq!(breakdown.overall_probability, 1.0);
        assert_eq!(breakdown.difficulty, Difficulty::Low);
        assert_eq!(breakdown.key_drivers, vec!["Technical".to_string()]);
    }

    #[test]
    fn test_fit_uses_only_scores_under_the_criterion() {
        let criteria = EvaluationCriteria::from_weights([("Technical", 0.5), ("Price", 0.5)]).unwrap();
        let matches = vec![MatchResult::new("P-1", 0.9)
            .with_requirement_score("REQ-001", 0.9)
            .with_requirement_score("REQ-002", 0.05)];
        let breakdown = score(&criteria, &matches, &BTreeMap::new());

        assert!((breakdown.criterion("Technical").unwrap().fit_score - 0.9).abs() < 1e-12);
        assert!((breakdown.criterion("Price").unwrap().fit_score - 0.05).abs() < 1e-12);
        assert!((breakdown.overall_probability - 0.975).abs() < 1e-12);
    }

    #[test]
    fn test_neutral_when_fit_equals_advantage() {
        let criteria = EvaluationCriteria::from_weights([("Technical", 1.0)]).unwrap();
        let matches = vec![MatchResult::new("P-1", 1.0).covering(["REQ-001"])];
        let profiles = BTreeMap::from([("Acme".to_string(), competitor(&["kubernetes"]))]);
        let breakdown = score(&criteria, &matches, &profiles);

        assert_eq!(breakdown.overall_probability, 0.5);
        assert!(breakdown.criterion("Technical").unwrap().resolved);
    }

    #[test]
    fn test_competitor_advantage_pushes_down() {
        let criteria = EvaluationCriteria::from_weights([("Technical", 0.5), ("Price", 0.5)]).unwrap();
        let profiles = BTreeMap::from([
            ("Acme".to_string(), competitor(&["kubernetes"])),
            ("Ghost".to_string(), CompetitorProfile::unknown()),
        ]);
        let breakdown = score(&criteria, &[], &profiles);

        let technical = breakdown.criterion("Technical").unwrap();
        assert_eq!(technical.competitor_advantage, 1.0);
        assert_eq!(technical.contribution, -0.5);
        assert_eq!(breakdown.overall_probability, 0.0);
        assert_eq!(breakdown.difficulty, Difficulty::High);

        // Known competitor data with zero overlap still resolves the criterion.
        assert!(breakdown.criterion("Price").unwrap().resolved);
    }

    #[test]
    fn test_empty_criteria_fails() {
        let err = ScoringEngine::new()
            .score(&ScoringInput {
                requirements: &[],
                criteria: &EvaluationCriteria::default(),
                matches: &[],
                profiles: &BTreeMap::new(),
                risk_flags: &BTreeSet::new(),
            })
            .unwrap_err();
        assert_eq!(err.kind(), "ScoringError");
    }

    #[test]
    fn test_confidence() {
        assert!((confidence(5, 0) - 1.0).abs() < 1e-12);
        assert!((confidence(1, 2) - 0.5).abs() < 1e-12);
        assert!((confidence(10, 20) - 0.65).abs() < 1e-12);
    }

    #[test]
    fn test_key_drivers_capped_and_ordered() {
        let names = ["A", "B", "C", "D", "E", "F", "G"];
        let criteria = EvaluationCriteria::uniform(names).unwrap();
        let mut reqs = Vec::new();
        let mut matches = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let id = format!("REQ-{i}");
            reqs.push(Requirement::new(id.clone(), "x", *name, true).with_criterion(*name));
            #[allow(clippy::cast_precision_loss)]
            matches.push(MatchResult::new(format!("P-{i}"), 0.1 * (i as f64 + 1.0)).covering([id]));
        }
        let breakdown = ScoringEngine::new()
            .score(&ScoringInput {
                requirements: &reqs,
                criteria: &criteria,
                matches: &matches,
                profiles: &BTreeMap::new(),
                risk_flags: &BTreeSet::new(),
            })
            .unwrap();

        assert_eq!(breakdown.key_drivers, vec!["G", "F", "E", "D", "C"]);
    }
}
