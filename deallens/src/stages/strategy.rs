//! Strategy synthesizer: differentiators, mitigations and SWOT.

use super::AnalysisStage;
use crate::context::AnalysisContext;
use crate::core::StageName;
use crate::errors::StageError;
use crate::model::{
    ActionItem, ActionType, CompetitorProfile, CriterionScore, Difficulty, GapAction, MatchResult,
    PricePositioning, Requirement, ScoreBreakdown, SkillGap, Strategy, Swot,
};
use crate::providers::CompletionProvider;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Track record at which a competitor counts as a serious threat.
const STRONG_TRACK_RECORD: f64 = 0.7;

/// Gap above which a proof of concept is proposed.
const POC_GAP: f64 = 0.3;

/// Everything the synthesizer reads besides the breakdown.
#[derive(Debug, Clone, Copy)]
pub struct StrategyInput<'a> {
    /// Score breakdown.
    pub breakdown: &'a ScoreBreakdown,
    /// Extracted requirements.
    pub requirements: &'a [Requirement],
    /// Internal matches; empty when the matcher failed.
    pub matches: &'a [MatchResult],
    /// Competitor profiles; empty when the profiler failed.
    pub profiles: &'a BTreeMap<String, CompetitorProfile>,
    /// Risk flags from extraction.
    pub risk_flags: &'a BTreeSet<String>,
    /// Uncovered mandatory requirements; empty when the matcher failed.
    pub skill_gaps: &'a [SkillGap],
}

/// Derives the bid strategy from the score breakdown.
#[derive(Default)]
pub struct StrategySynthesizer {
    narrator: Option<Arc<dyn CompletionProvider>>,
}

impl StrategySynthesizer {
    /// Creates a rule-only synthesizer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also asks `completion` for a short executive narrative.
    #[must_use]
    pub fn with_narrative(mut self, completion: Arc<dyn CompletionProvider>) -> Self {
        self.narrator = Some(completion);
        self
    }

    /// Builds the strategy. Fails only when the breakdown has no criteria,
    /// or when a requested narrative cannot be produced.
    #[instrument(skip_all)]
    pub async fn synthesize(&self, input: &StrategyInput<'_>) -> Result<Strategy, StageError> {
        let mut strategy = derive(input)?;
        if let Some(narrator) = &self.narrator {
            let prompt = narrative_prompt(input.breakdown, &strategy);
            let completion = narrator
                .complete(&prompt, &serde_json::json!({"narrative": "string"}))
                .await?;
            let text = completion
                .as_json()
                .and_then(|v| v.get("narrative").and_then(|n| n.as_str()).map(str::to_string))
                .unwrap_or_else(|| completion.text());
            let text = text.trim();
            if text.is_empty() {
                return Err(StageError::Synthesis("empty narrative".to_string()));
            }
            strategy.narrative = Some(text.to_string());
        }
        Ok(strategy)
    }
}

impl fmt::Debug for StrategySynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategySynthesizer")
            .field("narrative", &self.narrator.is_some())
            .finish()
    }
}

#[async_trait]
impl AnalysisStage for StrategySynthesizer {
    type Output = Strategy;

    fn name(&self) -> StageName {
        StageName::Strategy
    }

    async fn execute(&self, ctx: &AnalysisContext) -> Result<Self::Output, StageError> {
        let breakdown = ctx
            .scoring()
            .ok_or_else(|| StageError::Synthesis("no score breakdown".to_string()))?;
        let no_profiles = BTreeMap::new();
        let skill_gaps = ctx.skill_gaps().unwrap_or_default();
        let input = StrategyInput {
            breakdown,
            requirements: ctx.requirements(),
            matches: ctx.internal_matches().unwrap_or(&[]),
            profiles: ctx.competitor_profiles().unwrap_or(&no_profiles),
            risk_flags: ctx.risk_flags(),
            skill_gaps: &skill_gaps,
        };
        self.synthesize(&input).await
    }
}

/// The rule-based part of synthesis.
pub fn derive(input: &StrategyInput<'_>) -> Result<Strategy, StageError> {
    let per_criterion = &input.breakdown.per_criterion;
    if per_criterion.is_empty() {
        return Err(StageError::Synthesis(
            "score breakdown has no criteria".to_string(),
        ));
    }

    let mut positive: Vec<(&String, &CriterionScore)> = per_criterion
        .iter()
        .filter(|(_, s)| s.contribution > 0.0)
        .collect();
    positive.sort_by(|a, b| {
        b.1.contribution
            .total_cmp(&a.1.contribution)
            .then_with(|| a.0.cmp(b.0))
    });

    let mut negative: Vec<(&String, &CriterionScore)> = per_criterion
        .iter()
        .filter(|(_, s)| s.contribution < 0.0)
        .collect();
    negative.sort_by(|a, b| {
        a.1.contribution
            .total_cmp(&b.1.contribution)
            .then_with(|| a.0.cmp(b.0))
    });

    let differentiators = positive
        .iter()
        .map(|(name, score)| differentiator(name, score, input))
        .collect();

    let mut mitigations = Vec::new();
    let mut actions = Vec::new();
    for (name, score) in &negative {
        let action = choose_action(name, score, input.requirements);
        mitigations.push(format!(
            "{name}: competitors lead by {:.2} (fit {:.2} vs {:.2}, contribution {:.3}); plan a {action}",
            -score.differential(),
            score.fit_score,
            score.competitor_advantage,
            score.contribution,
        ));
        actions.push(ActionItem {
            criterion: (*name).clone(),
            action,
            contribution: score.contribution,
        });
    }

    let mut recommendations = recommendations(input.breakdown.difficulty, &negative);
    if !input.skill_gaps.is_empty() {
        recommendations.push(format!(
            "Close {} mandatory skill gap(s) before submission",
            input.skill_gaps.len()
        ));
    }

    let strategy = Strategy {
        differentiators,
        mitigations,
        actions,
        gap_actions: input.skill_gaps.iter().map(gap_action).collect(),
        swot: swot(input),
        recommendations,
        narrative: None,
    };
    debug!(
        differentiators = strategy.differentiators.len(),
        mitigations = strategy.mitigations.len(),
        gaps = strategy.gap_actions.len(),
        "strategy derived"
    );
    Ok(strategy)
}

fn under<'a>(requirements: &'a [Requirement], criterion: &str) -> Vec<&'a Requirement> {
    requirements.iter().filter(|r| r.is_under(criterion)).collect()
}

fn differentiator(name: &str, score: &CriterionScore, input: &StrategyInput<'_>) -> String {
    let ids: BTreeSet<&str> = under(input.requirements, name)
        .iter()
        .map(|r| r.id.as_str())
        .collect();
    let evidence: Vec<&str> = input
        .matches
        .iter()
        .filter(|m| m.best_score_among(&ids).is_some())
        .take(3)
        .map(|m| m.project_id.as_str())
        .collect();

    let mut message = format!(
        "{name}: fit {:.2} vs strongest competitor {:.2} (contribution +{:.3})",
        score.fit_score, score.competitor_advantage, score.contribution
    );
    if !evidence.is_empty() {
        message.push_str(&format!("; proven on {}", evidence.join(", ")));
    }
    message
}

fn choose_action(name: &str, score: &CriterionScore, requirements: &[Requirement]) -> ActionType {
    let has_mandatory = under(requirements, name).iter().any(|r| r.is_mandatory);
    if score.fit_score == 0.0 {
        if has_mandatory {
            ActionType::ExternalPartner
        } else {
            ActionType::SpecClarification
        }
    } else if -score.differential() > POC_GAP {
        ActionType::ProofOfConcept
    } else {
        ActionType::InternalReinforcement
    }
}

fn gap_action(gap: &SkillGap) -> GapAction {
    let severity = gap.severity();
    let (action, message) = match gap.best_similarity {
        None => (
            ActionType::ExternalPartner,
            format!(
                "{} ({}): no past project matches; bring in a partner with a reference",
                gap.requirement_id, gap.category
            ),
        ),
        Some(best) => (
            ActionType::InternalReinforcement,
            format!(
                "{} ({}): best past project only reaches {best:.2}; reinforce the team and document the experience",
                gap.requirement_id, gap.category
            ),
        ),
    };
    GapAction {
        requirement_id: gap.requirement_id.clone(),
        severity,
        action,
        message,
    }
}

fn swot(input: &StrategyInput<'_>) -> Swot {
    let mut swot = Swot::default();
    let known: Vec<(&String, &CompetitorProfile)> =
        input.profiles.iter().filter(|(_, p)| p.known).collect();

    for (name, score) in &input.breakdown.per_criterion {
        if !score.resolved {
            continue;
        }
        let diff = score.differential();
        if diff > 0.0 {
            swot.strengths.push(name.clone());
        } else if diff < 0.0 {
            swot.weaknesses.push(name.clone());
        }
        if !known.is_empty()
            && score.competitor_advantage == 0.0
            && !under(input.requirements, name).is_empty()
        {
            swot.opportunities
                .push(format!("No profiled competitor covers {name}"));
        }
    }

    for (competitor, profile) in &known {
        if profile.price_positioning == PricePositioning::Premium {
            swot.opportunities.push(format!(
                "{competitor} prices at a premium; a standard-priced bid can undercut it"
            ));
        }
    }

    for flag in input.risk_flags {
        swot.threats.push(format!("Risk: {flag}"));
    }
    for (competitor, profile) in &known {
        let leads: Vec<&str> = input
            .breakdown
            .per_criterion
            .iter()
            .filter(|(name, score)| {
                let reqs = under(input.requirements, name);
                let overlap = profile.capability_overlap(&reqs);
                overlap > 0.0 && overlap > score.fit_score
            })
            .map(|(name, _)| name.as_str())
            .collect();
        if profile.track_record_score >= STRONG_TRACK_RECORD && !leads.is_empty() {
            swot.threats.push(format!(
                "{competitor} has a strong track record ({:.2}) and leads on {}",
                profile.track_record_score,
                leads.join(", ")
            ));
        }
        if profile.price_positioning == PricePositioning::Low {
            swot.threats
                .push(format!("{competitor} competes on low price"));
        }
    }
    for (competitor, profile) in input.profiles {
        if profile.is_unknown() {
            swot.threats
                .push(format!("{competitor} could not be profiled; its position is unknown"));
        }
    }

    swot
}

fn recommendations(difficulty: Difficulty, negative: &[(&String, &CriterionScore)]) -> Vec<String> {
    let mut out = vec![match difficulty {
        Difficulty::Low => "Bid: lead the proposal with the differentiators".to_string(),
        Difficulty::Medium => {
            "Bid selectively: close the largest gaps before submission".to_string()
        }
        Difficulty::High => {
            "Reconsider the bid, or partner to cover the weakest criteria".to_string()
        }
    }];
    if let Some((name, _)) = negative.first() {
        out.push(format!("Prioritize {name}, the largest negative contribution"));
    }
    out
}

fn narrative_prompt(breakdown: &ScoreBreakdown, strategy: &Strategy) -> String {
    format!(
        "Write a three sentence executive summary of this bid assessment.\n\
         Win probability: {:.2} ({} difficulty)\n\
         Differentiators:\n{}\nMitigations:\n{}",
        breakdown.overall_probability,
        breakdown.difficulty,
        strategy.differentiators.join("\n"),
        strategy.mitigations.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::model::GapSeverity;
    use crate::providers::{Completion, MockCompletionProvider};
    use pretty_assertions::assert_eq;

    fn score(weight: f64, fit: f64, adv: f64, resolved: bool) -> CriterionScore {
        CriterionScore {
            weight,
            fit_score: fit,
            competitor_advantage: adv,
            contribution: (weight * (fit - adv)).clamp(-weight, weight),
            resolved,
        }
    }

    fn breakdown(entries: &[(&str, CriterionScore)]) -> ScoreBreakdown {
        let per_criterion: BTreeMap<String, CriterionScore> =
            entries.iter().map(|(n, s)| ((*n).to_string(), *s)).collect();
        let p = (0.5 + per_criterion.values().map(|s| s.contribution).sum::<f64>()).clamp(0.0, 1.0);
        ScoreBreakdown {
            overall_probability: p,
            per_criterion,
            difficulty: Difficulty::from_probability(p),
            confidence: 0.5,
            key_drivers: Vec::new(),
        }
    }

    fn requirements() -> Vec<Requirement> {
        vec![
            Requirement::new("REQ-001", "cloud migration", "Technical", true).with_criterion("Technical"),
            Requirement::new("REQ-002", "managed security operations", "Security", true)
                .with_criterion("Security"),
            Requirement::new("REQ-003", "training plan", "Management", false)
                .with_criterion("Management"),
        ]
    }

    fn acme() -> CompetitorProfile {
        CompetitorProfile {
            capabilities: vec!["security operations".to_string()],
            price_positioning: PricePositioning::Premium,
            track_record_score: 0.9,
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            known: true,
        }
    }

    #[test]
    fn test_partition_and_order() {
        let b = breakdown(&[
            ("Technical", score(0.4, 0.9, 0.0, true)),
            ("Security", score(0.4, 0.0, 1.0, true)),
            ("Management", score(0.1, 0.3, 0.5, true)),
            ("Price", score(0.1, 0.0, 0.0, false)),
        ]);
        let reqs = requirements();
        let matches = vec![MatchResult::new("P-9", 0.9).covering(["REQ-001"])];
        let profiles = BTreeMap::from([
            ("Acme".to_string(), acme()),
            ("Ghost".to_string(), CompetitorProfile::unknown()),
        ]);
        let risks = BTreeSet::from(["unclear SLA".to_string()]);

        let strategy = derive(&StrategyInput {
            breakdown: &b,
            requirements: &reqs,
            matches: &matches,
            profiles: &profiles,
            risk_flags: &risks,
            skill_gaps: &[],
        })
        .unwrap();

        assert_eq!(strategy.differentiators.len(), 1);
        assert!(strategy.differentiators[0].starts_with("Technical"));
        assert!(strategy.differentiators[0].contains("P-9"));

        assert_eq!(strategy.mitigations.len(), 2);
        assert!(strategy.mitigations[0].starts_with("Security"));
        assert_eq!(strategy.actions[0].action, ActionType::ExternalPartner);
        assert_eq!(strategy.actions[1].criterion, "Management");
        assert_eq!(strategy.actions[1].action, ActionType::InternalReinforcement);

        // Unresolved criteria stay out of SWOT.
        assert_eq!(strategy.swot.strengths, vec!["Technical"]);
        assert_eq!(strategy.swot.weaknesses, vec!["Management", "Security"]);
        assert!(strategy.swot.opportunities.iter().any(|o| o.contains("premium")));
        assert!(strategy.swot.threats.iter().any(|t| t == "Risk: unclear SLA"));
        assert!(strategy.swot.threats.iter().any(|t| t.starts_with("Acme has a strong track record")));
        assert!(strategy.swot.threats.iter().any(|t| t.starts_with("Ghost could not be profiled")));
        assert_eq!(strategy.recommendations.len(), 2);
    }

    #[test]
    fn test_skill_gaps_become_actions() {
        let b = breakdown(&[("Technical", score(1.0, 0.9, 0.0, true))]);
        let reqs = requirements();
        let matches = vec![MatchResult::new("P-9", 0.9)
            .with_requirement_score("REQ-001", 0.9)
            .with_requirement_score("REQ-002", 0.2)];
        let gaps = SkillGap::find(&matches, &reqs);

        let strategy = derive(&StrategyInput {
            breakdown: &b,
            requirements: &reqs,
            matches: &matches,
            profiles: &BTreeMap::new(),
            risk_flags: &BTreeSet::new(),
            skill_gaps: &gaps,
        })
        .unwrap();

        assert_eq!(strategy.gap_actions.len(), 1);
        let action = &strategy.gap_actions[0];
        assert_eq!(action.requirement_id, "REQ-002");
        assert_eq!(action.severity, GapSeverity::Weak);
        assert_eq!(action.action, ActionType::InternalReinforcement);
        assert!(action.message.contains("0.20"));
        assert!(strategy
            .recommendations
            .iter()
            .any(|r| r == "Close 1 mandatory skill gap(s) before submission"));
        // Gap actions do not change the criterion mitigations.
        assert!(strategy.mitigations.is_empty());
    }

    #[test]
    fn test_empty_breakdown_fails() {
        let b = breakdown(&[]);
        let err = derive(&StrategyInput {
            breakdown: &b,
            requirements: &[],
            matches: &[],
            profiles: &BTreeMap::new(),
            risk_flags: &BTreeSet::new(),
            skill_gaps: &[],
        })
        .unwrap_err();
        assert_eq!(err.kind(), "SynthesisError");
    }

    #[tokio::test]
    async fn test_narrative_from_completion() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete().returning(|_, _| {
            Ok(Completion::Structured(serde_json::json!({"narrative": " Strong technical bid. "})))
        });
        let b = breakdown(&[("Technical", score(1.0, 0.8, 0.0, true))]);
        let reqs = requirements();

        let strategy = StrategySynthesizer::new()
            .with_narrative(Arc::new(mock))
            .synthesize(&StrategyInput {
                breakdown: &b,
                requirements: &reqs,
                matches: &[],
                profiles: &BTreeMap::new(),
                risk_flags: &BTreeSet::new(),
                skill_gaps: &[],
            })
            .await
            .unwrap();

        assert_eq!(strategy.narrative.as_deref(), Some("Strong technical bid."));
    }

    #[tokio::test]
    async fn test_narrative_provider_failure_fails_stage() {
        let mut mock = MockCompletionProvider::new();
        mock.expect_complete()
            .returning(|_, _| Err(ProviderError::new(crate::errors::ProviderErrorKind::RateLimited, "429")));
        let b = breakdown(&[("Technical", score(1.0, 0.8, 0.0, true))]);

        let err = StrategySynthesizer::new()
            .with_narrative(Arc::new(mock))
            .synthesize(&StrategyInput {
                breakdown: &b,
                requirements: &[],
                matches: &[],
                profiles: &BTreeMap::new(),
                risk_flags: &BTreeSet::new(),
                skill_gaps: &[],
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ProviderError");
    }
}
