//! Extraction stage: RFP text to requirements, criteria and risk flags.

use super::draft::{parse_text, scan_risk_keywords, ExtractionDraft};
use super::AnalysisStage;
use crate::context::{AnalysisContext, ExtractionOutput, RawInput};
use crate::core::StageName;
use crate::errors::StageError;
use crate::model::{EvaluationCriteria, Requirement, RfpMetadata};
use crate::providers::CompletionProvider;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

const DEFAULT_CATEGORY: &str = "General";

/// Turns raw RFP text into the structured requirement model.
pub struct ExtractionStage {
    completion: Arc<dyn CompletionProvider>,
    weight_tolerance: f64,
}

impl ExtractionStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(completion: Arc<dyn CompletionProvider>) -> Self {
        Self {
            completion,
            weight_tolerance: 1e-6,
        }
    }

    /// Sets the allowed deviation of the weight sum from 1.0.
    #[must_use]
    pub fn with_weight_tolerance(mut self, tolerance: f64) -> Self {
        self.weight_tolerance = tolerance;
        self
    }

    /// Asks the completion provider for a draft and normalizes it.
    #[instrument(skip_all, fields(chars = raw.char_count()))]
    pub async fn extract(&self, raw: &RawInput) -> Result<ExtractionOutput, StageError> {
        let prompt = build_prompt(raw);
        let completion = self.completion.complete(&prompt, &schema_hint()).await?;

        let draft = match completion.as_json() {
            Some(value) => serde_json::from_value::<ExtractionDraft>(value).map_err(|e| {
                StageError::Extraction(format!("malformed extraction payload: {e}"))
            })?,
            None => parse_text(&completion.text()),
        };
        debug!(
            requirements = draft.requirements.len(),
            criteria = draft.evaluation_criteria.len(),
            "extraction draft received"
        );

        normalize_draft(draft, &raw.text, self.weight_tolerance)
    }
}

impl fmt::Debug for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionStage")
            .field("weight_tolerance", &self.weight_tolerance)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AnalysisStage for ExtractionStage {
    type Output = ExtractionOutput;

    fn name(&self) -> StageName {
        StageName::Extraction
    }

    async fn execute(&self, ctx: &AnalysisContext) -> Result<Self::Output, StageError> {
        self.extract(ctx.raw_input()).await
    }
}

fn build_prompt(raw: &RawInput) -> String {
    let mut prompt = String::from(
        "Extract the requirements, evaluation criteria with weights, risk flags, title, \
         timeline, budget and submission format from the RFP below.\n",
    );
    if !raw.supplementary_info.is_empty() {
        prompt.push_str("\nAdditional context:\n");
        for (key, value) in &raw.supplementary_info {
            prompt.push_str(&format!("- {key}: {value}\n"));
        }
    }
    prompt.push_str("\nRFP:\n");
    prompt.push_str(&raw.text);
    prompt
}

fn schema_hint() -> serde_json::Value {
    serde_json::json!({
        "requirements": [{
            "id": "string",
            "text": "string",
            "category": "string",
            "is_mandatory": "boolean",
            "criterion": "string | null"
        }],
        "evaluation_criteria": [{"name": "string", "weight": "number | null"}],
        "risk_flags": ["string"],
        "title": "string | null",
        "timeline": "string | null",
        "budget_range": "string | null",
        "submission_format": "string | null"
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validates and normalizes a draft.
///
/// Requirements are deduplicated by normalized text and given stable ids.
/// Criteria weights are normalized; with no criteria at all, the distinct
/// requirement categories become uniformly weighted criteria. Requirements
/// are then tagged with the criterion matching their explicit criterion or,
/// failing that, their category.
pub fn normalize_draft(
    draft: ExtractionDraft,
    raw_text: &str,
    weight_tolerance: f64,
) -> Result<ExtractionOutput, StageError> {
    let mut seen_text = HashSet::new();
    let mut seen_ids = HashSet::new();
    let mut requirements = Vec::new();

    for item in draft.requirements {
        let text = item.text.trim().to_string();
        if text.is_empty() {
            continue;
        }
        let is_mandatory = item.mandatory();
        let category = non_empty(item.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let mut requirement = Requirement::new(String::new(), text, category, is_mandatory);
        if !seen_text.insert(requirement.normalized_text()) {
            continue;
        }
        requirement.criterion = non_empty(item.criterion);
        requirement.id = non_empty(item.id)
            .filter(|id| !seen_ids.contains(id))
            .unwrap_or_default();
        if !requirement.id.is_empty() {
            seen_ids.insert(requirement.id.clone());
        }
        requirements.push(requirement);
    }

    if requirements.is_empty() {
        return Err(StageError::Extraction(
            "no identifiable requirements in the RFP".to_string(),
        ));
    }

    let mut next = 1usize;
    for requirement in requirements.iter_mut().filter(|r| r.id.is_empty()) {
        let mut id = format!("REQ-{next:03}");
        while seen_ids.contains(&id) {
            next += 1;
            id = format!("REQ-{next:03}");
        }
        next += 1;
        seen_ids.insert(id.clone());
        requirement.id = id;
    }

    let criteria = if draft.evaluation_criteria.is_empty() {
        EvaluationCriteria::uniform(requirements.iter().map(|r| r.category.clone()))
    } else {
        EvaluationCriteria::normalized(
            draft
                .evaluation_criteria
                .iter()
                .map(|c| (c.name.as_str(), c.weight)),
        )
    }
    .map_err(|e| StageError::Extraction(format!("criteria weights cannot be normalized: {e}")))?;

    if (criteria.total() - 1.0).abs() > weight_tolerance {
        return Err(StageError::Extraction(format!(
            "criteria weights sum to {}",
            criteria.total()
        )));
    }

    for requirement in &mut requirements {
        let tagged = requirement
            .criterion
            .as_deref()
            .and_then(|c| criteria.resolve(c))
            .or_else(|| criteria.resolve(&requirement.category))
            .map(str::to_string);
        requirement.criterion = tagged;
    }

    let mut risk_flags: BTreeSet<String> = draft
        .risk_flags
        .iter()
        .map(super::draft::DraftRisk::render)
        .filter(|r| !r.is_empty())
        .collect();
    risk_flags.extend(scan_risk_keywords(raw_text));

    Ok(ExtractionOutput {
        requirements,
        evaluation_criteria: criteria,
        risk_flags,
        metadata: RfpMetadata {
            title: non_empty(draft.title),
            timeline: non_empty(draft.timeline),
            budget_range: non_empty(draft.budget_range),
            submission_format: non_empty(draft.submission_format),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::providers::{Completion, MockCompletionProvider};
    use crate::stages::draft::{DraftCriterion, DraftRequirement};
    use pretty_assertions::assert_eq;

    fn req(text: &str, category: &str) -> DraftRequirement {
        DraftRequirement {
            text: text.to_string(),
            category: Some(category.to_string()),
            ..Default::default()
        }
    }

    fn draft(requirements: Vec<DraftRequirement>, criteria: Vec<(&str, Option<f64>)>) -> ExtractionDraft {
        ExtractionDraft {
            requirements,
            evaluation_criteria: criteria
                .into_iter()
                .map(|(name, weight)| DraftCriterion { name: name.to_string(), weight })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_dedup_and_ids() {
        let out = normalize_draft(
            draft(
                vec![
                    req("Support SSO", "Security"),
                    req("  support   sso ", "Security"),
                    DraftRequirement {
                        id: Some("REQ-001".to_string()),
                        ..req("Encrypt data", "Security")
                    },
                    req("Host in EU", "Operations"),
                ],
                vec![],
            ),
            "",
            1e-6,
        )
        .unwrap();

        let ids: Vec<&str> = out.requirements.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["REQ-002", "REQ-001", "REQ-003"]);
    }

    #[test]
    fn test_uniform_criteria_from_categories() {
        let out = normalize_draft(
            draft(vec![req("a", "Technical"), req("b", "technical"), req("c", "Price")], vec![]),
            "",
            1e-6,
        )
        .unwrap();

        assert_eq!(out.evaluation_criteria.len(), 2);
        assert!((out.evaluation_criteria.get("Technical").unwrap() - 0.5).abs() < 1e-12);
        assert!(out
            .requirements
            .iter()
            .all(|r| r.criterion.as_deref() == Some(if r.category == "Price" { "Price" } else { "Technical" })));
    }

    #[test]
    fn test_explicit_criterion_wins_over_category() {
        let mut item = req("Pen test every release", "Operations");
        item.criterion = Some("SECURITY".to_string());
        let out = normalize_draft(
            draft(
                vec![item, req("Unmapped", "Legal")],
                vec![("Security", Some(0.7)), ("Operations", Some(0.3))],
            ),
            "",
            1e-6,
        )
        .unwrap();

        assert_eq!(out.requirements[0].criterion.as_deref(), Some("Security"));
        assert_eq!(out.requirements[1].criterion, None);
    }

    #[test]
    fn test_failures() {
        let err = normalize_draft(draft(vec![], vec![("Technical", None)]), "", 1e-6).unwrap_err();
        assert!(matches!(err, StageError::Extraction(_)));

        let err = normalize_draft(
            draft(vec![req("a", "Technical")], vec![("Technical", Some(0.0)), ("Price", Some(0.0))]),
            "",
            1e-6,
        )
        .unwrap_err();
        assert!(err.to_string().contains("sum to zero"));
    }

    #[test]
    fn test_risk_flags_merge_draft_and_scan() {
        let mut d = draft(vec![req("a", "Technical")], vec![]);
        d.risk_flags.push(super::super::draft::DraftRisk::Note("Tight deadline".to_string()));
        let out = normalize_draft(d, "Liability is unlimited under the legal terms.", 1e-6).unwrap();

        assert_eq!(out.risk_flags.len(), 2);
        assert!(out.risk_flags.contains("Tight deadline"));
    }

    #[tokio::test]
    async fn test_extract_from_text_completion() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete().times(1).returning(|prompt, _| {
            assert!(prompt.contains("region: EMEA"));
            Ok(Completion::Text(
                "Requirement [Technical] (mandatory): Build the API\nCriterion: Technical (1)".to_string(),
            ))
        });

        let stage = ExtractionStage::new(Arc::new(mock));
        let raw = RawInput::new("Build an API.").with_info("region", "EMEA");
        let out = stage.extract(&raw).await.unwrap();

        assert_eq!(out.requirements.len(), 1);
        assert_eq!(out.requirements[0].criterion.as_deref(), Some("Technical"));
    }

    #[tokio::test]
    async fn test_provider_error_surfaces_as_stage_error() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .returning(|_, _| Err(ProviderError::unavailable("model offline")));

        let stage = ExtractionStage::new(Arc::new(mock));
        let err = stage.extract(&RawInput::new("text")).await.unwrap_err();
        assert_eq!(err.kind(), "ProviderError");
    }

    #[tokio::test]
    async fn test_malformed_json_payload() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .returning(|_, _| Ok(Completion::Structured(serde_json::json!({"requirements": 3}))));

        let stage = ExtractionStage::new(Arc::new(mock));
        let err = stage.extract(&RawInput::new("text")).await.unwrap_err();
        assert!(matches!(err, StageError::Extraction(_)));
    }
}
