//! The analysis context shared by all stages of one run.

use super::input::{RawInput, ValidatedInput};
use super::slot::WriteOnce;
use crate::core::{StageName, StageRecord, StageStatus};
use crate::errors::{DealLensError, InvalidTransitionError, StageError};
use crate::model::{
    CompetitorProfile, EvaluationCriteria, MatchResult, Readiness, Requirement, RfpMetadata,
    ScoreBreakdown, SkillGap, Strategy,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Everything known about one RFP analysis run.
///
/// Stage outputs are written once, and only together with the transition of
/// their stage to `Succeeded`, so `stage_status` always explains which
/// fields are present. Mutators are crate-private; outside the orchestrator
/// the context is read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    rfp_id: Uuid,
    raw_input: RawInput,
    input_digest: String,
    competitor_names: Vec<String>,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    finalized_at: Option<DateTime<Utc>>,
    #[serde(default)]
    warnings: Vec<String>,
    #[serde(default)]
    requirements: WriteOnce<Vec<Requirement>>,
    #[serde(default)]
    evaluation_criteria: WriteOnce<EvaluationCriteria>,
    #[serde(default)]
    risk_flags: BTreeSet<String>,
    #[serde(default)]
    rfp_metadata: WriteOnce<RfpMetadata>,
    #[serde(default)]
    internal_matches: WriteOnce<Vec<MatchResult>>,
    #[serde(default)]
    competitor_profiles: WriteOnce<BTreeMap<String, CompetitorProfile>>,
    #[serde(default)]
    scoring: WriteOnce<ScoreBreakdown>,
    #[serde(default)]
    strategy: WriteOnce<Strategy>,
    stage_status: BTreeMap<StageName, StageRecord>,
}

/// Everything the Extraction stage writes.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutput {
    /// Deduplicated requirements.
    pub requirements: Vec<Requirement>,
    /// Normalized weights.
    pub evaluation_criteria: EvaluationCriteria,
    /// Risk notes.
    pub risk_flags: BTreeSet<String>,
    /// Document-level facts.
    pub metadata: RfpMetadata,
}

impl AnalysisContext {
    /// Creates a fresh context with every stage `Pending`.
    #[must_use]
    pub fn new(input: ValidatedInput) -> Self {
        let input_digest = hex::encode(Sha256::digest(input.raw.text.as_bytes()));
        Self {
            rfp_id: Uuid::new_v4(),
            raw_input: input.raw,
            input_digest,
            competitor_names: input.competitors,
            created_at: Utc::now(),
            finalized_at: None,
            warnings: input.warnings,
            requirements: WriteOnce::new(),
            evaluation_criteria: WriteOnce::new(),
            risk_flags: BTreeSet::new(),
            rfp_metadata: WriteOnce::new(),
            internal_matches: WriteOnce::new(),
            competitor_profiles: WriteOnce::new(),
            scoring: WriteOnce::new(),
            strategy: WriteOnce::new(),
            stage_status: StageName::ALL
                .iter()
                .map(|s| (*s, StageRecord::default()))
                .collect(),
        }
    }

    /// Run identifier.
    #[must_use]
    pub fn rfp_id(&self) -> Uuid {
        self.rfp_id
    }

    /// The document as handed to the run.
    #[must_use]
    pub fn raw_input(&self) -> &RawInput {
        &self.raw_input
    }

    /// SHA-256 of the RFP text, hex encoded.
    #[must_use]
    pub fn input_digest(&self) -> &str {
        &self.input_digest
    }

    /// Competitors the run was asked to profile.
    #[must_use]
    pub fn competitor_names(&self) -> &[String] {
        &self.competitor_names
    }

    /// When the run started.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the run finished, if it has.
    #[must_use]
    pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
        self.finalized_at
    }

    /// Returns true once the orchestrator handed the context back.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    /// Non-fatal findings from input validation.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Extracted requirements; empty unless Extraction succeeded.
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        self.requirements.get().map_or(&[], Vec::as_slice)
    }

    /// Normalized evaluation criteria.
    #[must_use]
    pub fn evaluation_criteria(&self) -> Option<&EvaluationCriteria> {
        self.evaluation_criteria.get()
    }

    /// Risk notes raised by Extraction.
    #[must_use]
    pub fn risk_flags(&self) -> &BTreeSet<String> {
        &self.risk_flags
    }

    /// Title, timeline, budget and submission format.
    #[must_use]
    pub fn rfp_metadata(&self) -> Option<&RfpMetadata> {
        self.rfp_metadata.get()
    }

    /// Ranked internal matches. `Some(&[])` is a successful empty search.
    #[must_use]
    pub fn internal_matches(&self) -> Option<&[MatchResult]> {
        self.internal_matches.get().map(Vec::as_slice)
    }

    /// Profiles keyed by competitor name.
    #[must_use]
    pub fn competitor_profiles(&self) -> Option<&BTreeMap<String, CompetitorProfile>> {
        self.competitor_profiles.get()
    }

    /// Win probability breakdown.
    #[must_use]
    pub fn scoring(&self) -> Option<&ScoreBreakdown> {
        self.scoring.get()
    }

    /// Bid strategy.
    #[must_use]
    pub fn strategy(&self) -> Option<&Strategy> {
        self.strategy.get()
    }

    /// Delivery readiness, available once the matcher succeeded.
    #[must_use]
    pub fn readiness(&self) -> Option<Readiness> {
        self.internal_matches()
            .map(|matches| Readiness::assess(matches, self.requirements()))
    }

    /// Mandatory requirements without a well-matched project, available
    /// once the matcher succeeded.
    #[must_use]
    pub fn skill_gaps(&self) -> Option<Vec<SkillGap>> {
        self.internal_matches()
            .map(|matches| SkillGap::find(matches, self.requirements()))
    }

    /// The full stage record map.
    #[must_use]
    pub fn stage_status(&self) -> &BTreeMap<StageName, StageRecord> {
        &self.stage_status
    }

    /// Record of one stage.
    #[must_use]
    pub fn stage(&self, stage: StageName) -> StageRecord {
        self.stage_status.get(&stage).cloned().unwrap_or_default()
    }

    /// Status of one stage.
    #[must_use]
    pub fn status_of(&self, stage: StageName) -> StageStatus {
        self.stage_status
            .get(&stage)
            .map_or(StageStatus::Pending, |r| r.status)
    }

    /// Returns true if every stage is terminal.
    #[must_use]
    pub fn all_terminal(&self) -> bool {
        StageName::ALL.iter().all(|s| self.status_of(*s).is_terminal())
    }

    // Transitions

    fn transition(
        &mut self,
        stage: StageName,
        to: StageStatus,
    ) -> Result<&mut StageRecord, InvalidTransitionError> {
        let record = self.stage_status.entry(stage).or_default();
        if !record.status.can_transition_to(to) {
            return Err(InvalidTransitionError {
                stage,
                from: record.status,
                to,
            });
        }
        record.status = to;
        Ok(record)
    }

    fn finish(record: &mut StageRecord) {
        let now = Utc::now();
        record.finished_at = Some(now);
        record.duration_ms = record
            .started_at
            .and_then(|start| (now - start).to_std().ok())
            .map(|d| d.as_secs_f64() * 1000.0);
    }

    fn ensure_can_succeed(&self, stage: StageName) -> Result<(), InvalidTransitionError> {
        let from = self.status_of(stage);
        if from.can_transition_to(StageStatus::Succeeded) {
            Ok(())
        } else {
            Err(InvalidTransitionError {
                stage,
                from,
                to: StageStatus::Succeeded,
            })
        }
    }

    /// `Pending -> Running`. Every upstream stage must already be terminal.
    pub(crate) fn mark_running(&mut self, stage: StageName) -> Result<(), DealLensError> {
        if let Some(pending) = stage
            .upstream()
            .iter()
            .find(|up| !self.status_of(**up).is_terminal())
        {
            return Err(DealLensError::Internal(format!(
                "stage '{stage}' dispatched before '{pending}' finished"
            )));
        }
        let record = self.transition(stage, StageStatus::Running)?;
        record.started_at = Some(Utc::now());
        Ok(())
    }

    /// `Running -> Failed`, recording the error.
    pub(crate) fn mark_failed(
        &mut self,
        stage: StageName,
        error: &StageError,
    ) -> Result<(), InvalidTransitionError> {
        let record = self.transition(stage, StageStatus::Failed)?;
        record.reason = Some(error.to_string());
        record.error_kind = Some(error.kind().to_string());
        Self::finish(record);
        Ok(())
    }

    /// `Pending -> Skipped`.
    pub(crate) fn mark_skipped(
        &mut self,
        stage: StageName,
        reason: impl Into<String>,
    ) -> Result<(), InvalidTransitionError> {
        let record = self.transition(stage, StageStatus::Skipped)?;
        record.reason = Some(reason.into());
        record.finished_at = Some(Utc::now());
        Ok(())
    }

    fn mark_succeeded(&mut self, stage: StageName) -> Result<(), InvalidTransitionError> {
        let record = self.transition(stage, StageStatus::Succeeded)?;
        Self::finish(record);
        Ok(())
    }

    // Stage outputs. Each writes its fields and flips the stage to Succeeded.

    pub(crate) fn complete_extraction(
        &mut self,
        output: ExtractionOutput,
    ) -> Result<(), DealLensError> {
        self.ensure_can_succeed(StageName::Extraction)?;
        self.requirements.set("requirements", output.requirements)?;
        self.evaluation_criteria
            .set("evaluation_criteria", output.evaluation_criteria)?;
        self.rfp_metadata.set("rfp_metadata", output.metadata)?;
        self.risk_flags.extend(output.risk_flags);
        self.mark_succeeded(StageName::Extraction)?;
        Ok(())
    }

    pub(crate) fn complete_matching(
        &mut self,
        matches: Vec<MatchResult>,
    ) -> Result<(), DealLensError> {
        self.ensure_can_succeed(StageName::InternalMatcher)?;
        self.internal_matches.set("internal_matches", matches)?;
        self.mark_succeeded(StageName::InternalMatcher)?;
        Ok(())
    }

    pub(crate) fn complete_profiling(
        &mut self,
        profiles: BTreeMap<String, CompetitorProfile>,
    ) -> Result<(), DealLensError> {
        self.ensure_can_succeed(StageName::CompetitorProfiler)?;
        self.competitor_profiles
            .set("competitor_profiles", profiles)?;
        self.mark_succeeded(StageName::CompetitorProfiler)?;
        Ok(())
    }

    pub(crate) fn complete_scoring(
        &mut self,
        breakdown: ScoreBreakdown,
    ) -> Result<(), DealLensError> {
        self.ensure_can_succeed(StageName::Scoring)?;
        self.scoring.set("scoring", breakdown)?;
        self.mark_succeeded(StageName::Scoring)?;
        Ok(())
    }

    pub(crate) fn complete_strategy(&mut self, strategy: Strategy) -> Result<(), DealLensError> {
        self.ensure_can_succeed(StageName::Strategy)?;
        self.strategy.set("strategy", strategy)?;
        self.mark_succeeded(StageName::Strategy)?;
        Ok(())
    }

    /// Seals the context. Every stage must be terminal.
    pub(crate) fn finalize(&mut self) -> Result<(), DealLensError> {
        if let Some(open) = StageName::ALL
            .iter()
            .find(|s| !self.status_of(**s).is_terminal())
        {
            return Err(DealLensError::Internal(format!(
                "cannot finalize: stage '{open}' is {}",
                self.status_of(*open)
            )));
        }
        self.finalized_at = Some(Utc::now());
        Ok(())
    }

    /// Serializes the whole context as pretty JSON.
    pub fn to_json(&self) -> Result<String, DealLensError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::context::validate_input;
    use pretty_assertions::assert_eq;

    fn context() -> AnalysisContext {
        let input = validate_input(
            RawInput::new("Requirement: migrate to the cloud"),
            &["Acme".to_string()],
            &AnalysisConfig::default(),
        )
        .unwrap();
        AnalysisContext::new(input)
    }

    fn extraction() -> ExtractionOutput {
        ExtractionOutput {
            requirements: vec![Requirement::new("REQ-001", "migrate", "Technical", true)],
            evaluation_criteria: EvaluationCriteria::uniform(["Technical"]).unwrap(),
            risk_flags: BTreeSet::from(["legal review needed".to_string()]),
            metadata: RfpMetadata::default(),
        }
    }

    #[test]
    fn test_new_context_is_all_pending() {
        let ctx = context();
        assert_eq!(ctx.stage_status().len(), 5);
        assert!(StageName::ALL
            .iter()
            .all(|s| ctx.status_of(*s) == StageStatus::Pending));
        assert!(ctx.requirements().is_empty());
        assert_eq!(ctx.input_digest().len(), 64);
        assert_eq!(ctx.competitor_names(), &["Acme".to_string()]);
    }

    #[test]
    fn test_output_requires_running_stage() {
        let mut ctx = context();
        let err = ctx.complete_extraction(extraction()).unwrap_err();
        assert!(matches!(err, DealLensError::InvalidTransition(_)));
        assert!(ctx.requirements().is_empty());

        ctx.mark_running(StageName::Extraction).unwrap();
        ctx.complete_extraction(extraction()).unwrap();

        let record = ctx.stage(StageName::Extraction);
        assert_eq!(record.status, StageStatus::Succeeded);
        assert!(record.duration_ms.is_some());
        assert_eq!(ctx.requirements().len(), 1);
        assert_eq!(ctx.risk_flags().len(), 1);
    }

    #[test]
    fn test_second_completion_rejected() {
        let mut ctx = context();
        ctx.mark_running(StageName::Extraction).unwrap();
        ctx.complete_extraction(extraction()).unwrap();

        let err = ctx.complete_extraction(extraction()).unwrap_err();
        assert!(matches!(err, DealLensError::InvalidTransition(_)));
        assert_eq!(ctx.requirements().len(), 1);
    }

    #[test]
    fn test_scoring_cannot_start_before_producers() {
        let mut ctx = context();
        ctx.mark_running(StageName::Extraction).unwrap();
        ctx.complete_extraction(extraction()).unwrap();
        ctx.mark_running(StageName::InternalMatcher).unwrap();

        let err = ctx.mark_running(StageName::Scoring).unwrap_err();
        assert!(matches!(err, DealLensError::Internal(_)));
    }

    #[test]
    fn test_failure_and_skip_records() {
        let mut ctx = context();
        ctx.mark_running(StageName::Extraction).unwrap();
        ctx.mark_failed(StageName::Extraction, &StageError::Timeout).unwrap();
        for stage in StageName::Extraction.hard_dependents() {
            ctx.mark_skipped(*stage, "extraction failed").unwrap();
        }

        let record = ctx.stage(StageName::Extraction);
        assert_eq!(record.reason.as_deref(), Some("timeout"));
        assert_eq!(record.error_kind.as_deref(), Some("TimeoutError"));
        assert_eq!(ctx.stage(StageName::Scoring).describe(), "skipped (extraction failed)");
        assert!(ctx.all_terminal());

        // Skipped is terminal; it cannot be revived.
        assert!(ctx.mark_running(StageName::Scoring).is_err());
        ctx.finalize().unwrap();
        assert!(ctx.is_finalized());
    }

    #[test]
    fn test_finalize_requires_terminal_stages() {
        let mut ctx = context();
        assert!(matches!(ctx.finalize(), Err(DealLensError::Internal(_))));
    }

    #[test]
    fn test_json_round_trip_keeps_status() {
        let mut ctx = context();
        ctx.mark_running(StageName::Extraction).unwrap();
        ctx.complete_extraction(extraction()).unwrap();

        let json = ctx.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["stage_status"]["extraction"]["status"], "succeeded");
        assert_eq!(value["internal_matches"], serde_json::Value::Null);

        let back: AnalysisContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rfp_id(), ctx.rfp_id());
        assert_eq!(back.requirements(), ctx.requirements());
        assert_eq!(back.status_of(StageName::Extraction), StageStatus::Succeeded);
        assert!(back.internal_matches().is_none());
    }
}
