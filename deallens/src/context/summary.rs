//! Compact, report-friendly view of a finished analysis.

use super::AnalysisContext;
use crate::core::StageName;
use crate::errors::DealLensError;
use crate::model::{Difficulty, Readiness};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Headline numbers and stage outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Run identifier.
    pub rfp_id: Uuid,
    /// Project title, if extraction found one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Number of requirements.
    pub requirement_count: usize,
    /// Number of mandatory requirements.
    pub mandatory_count: usize,
    /// Number of evaluation criteria.
    pub criteria_count: usize,
    /// Number of risk flags.
    pub risk_count: usize,
    /// `None` when the matcher did not succeed.
    pub match_count: Option<usize>,
    /// Delivery readiness grade.
    pub readiness: Option<Readiness>,
    /// Number of uncovered mandatory requirements.
    pub skill_gap_count: Option<usize>,
    /// `None` when the profiler did not succeed.
    pub competitor_count: Option<usize>,
    /// Competitors that fell back to the unknown profile.
    pub unknown_competitors: Vec<String>,
    /// Win probability.
    pub overall_probability: Option<f64>,
    /// Difficulty band.
    pub difficulty: Option<Difficulty>,
    /// Confidence in the estimate.
    pub confidence: Option<f64>,
    /// Criteria that move the probability most.
    pub key_drivers: Vec<String>,
    /// Number of differentiators.
    pub differentiator_count: Option<usize>,
    /// Number of mitigations.
    pub mitigation_count: Option<usize>,
    /// Stage name to a short description such as `failed (timeout)`.
    pub stages: BTreeMap<StageName, String>,
    /// Input validation warnings.
    pub warnings: Vec<String>,
}

impl AnalysisSummary {
    /// Builds the summary from a context.
    #[must_use]
    pub fn from_context(ctx: &AnalysisContext) -> Self {
        let requirements = ctx.requirements();
        let scoring = ctx.scoring();
        let strategy = ctx.strategy();
        let profiles = ctx.competitor_profiles();

        Self {
            rfp_id: ctx.rfp_id(),
            title: ctx.rfp_metadata().and_then(|m| m.title.clone()),
            requirement_count: requirements.len(),
            mandatory_count: requirements.iter().filter(|r| r.is_mandatory).count(),
            criteria_count: ctx.evaluation_criteria().map_or(0, |c| c.len()),
            risk_count: ctx.risk_flags().len(),
            match_count: ctx.internal_matches().map(<[_]>::len),
            readiness: ctx.readiness(),
            skill_gap_count: ctx.skill_gaps().map(|gaps| gaps.len()),
            competitor_count: profiles.map(BTreeMap::len),
            unknown_competitors: profiles
                .map(|p| {
                    p.iter()
                        .filter(|(_, profile)| profile.is_unknown())
                        .map(|(name, _)| name.clone())
                        .collect()
                })
                .unwrap_or_default(),
            overall_probability: scoring.map(|s| s.overall_probability),
            difficulty: scoring.map(|s| s.difficulty),
            confidence: scoring.map(|s| s.confidence),
            key_drivers: scoring.map(|s| s.key_drivers.clone()).unwrap_or_default(),
            differentiator_count: strategy.map(|s| s.differentiators.len()),
            mitigation_count: strategy.map(|s| s.mitigations.len()),
            stages: ctx
                .stage_status()
                .iter()
                .map(|(name, record)| (*name, record.describe()))
                .collect(),
            warnings: ctx.warnings().to_vec(),
        }
    }

    /// Serializes the summary as pretty JSON.
    pub fn to_json(&self) -> Result<String, DealLensError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl AnalysisContext {
    /// Headline view of the run.
    #[must_use]
    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary::from_context(self)
    }
}
