//! Follow-up questions over a finished analysis.
//!
//! [`answer`] classifies a question by keyword and projects the relevant
//! part of an [`AnalysisContext`] into text. It never mutates the context.
//! When a field it needs is absent, the answer says so and names the stage
//! status that explains the gap instead of guessing.

use crate::context::AnalysisContext;
use crate::core::StageName;
use crate::model::{CompetitorProfile, Requirement, RfpMetadata, ScoreBreakdown, Strategy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};

/// What a question is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Overall picture.
    Summary,
    /// Win probability and its drivers.
    Score,
    /// Competitor positioning.
    Competitors,
    /// Risk flags and threats.
    Risks,
    /// Differentiators, mitigations, gap actions and SWOT.
    Strategy,
    /// Requirements and evaluation criteria.
    Requirements,
    /// Anything else; answered with the summary.
    General,
}

// Checked in order; the first group with a hit wins.
const KEYWORDS: &[(QueryKind, &[&str])] = &[
    (QueryKind::Summary, &["summary", "summarize", "summarise", "overview", "tl;dr"]),
    (
        QueryKind::Strategy,
        &["strategy", "differentiat", "mitigat", "swot", "recommend", "improve", "how can we", "how do we win"],
    ),
    (QueryKind::Competitors, &["competitor", "compete", "rival", "versus", " vs "]),
    (QueryKind::Risks, &["risk", "concern", "red flag", "threat", "danger"]),
    (
        QueryKind::Requirements,
        &["requirement", "mandatory", "criteria", "criterion", "weight", "evaluat"],
    ),
    (QueryKind::Score, &["probability", "chance", "odds", "score", "likely", "win"]),
];

impl QueryKind {
    /// Classifies a question by keyword.
    #[must_use]
    pub fn classify(question: &str) -> Self {
        let lowered = format!(" {} ", question.to_lowercase());
        KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lowered.contains(w)))
            .map_or(Self::General, |(kind, _)| *kind)
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summary => write!(f, "summary"),
            Self::Score => write!(f, "score"),
            Self::Competitors => write!(f, "competitors"),
            Self::Risks => write!(f, "risks"),
            Self::Strategy => write!(f, "strategy"),
            Self::Requirements => write!(f, "requirements"),
            Self::General => write!(f, "general"),
        }
    }
}

/// A context field the answer needed but could not use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableField {
    /// Field name in the context.
    pub field: String,
    /// Stage responsible for the field.
    pub stage: StageName,
    /// That stage's status, e.g. `failed (timeout)`.
    pub status: String,
}

/// Answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// How the question was classified.
    pub kind: QueryKind,
    /// The answer text.
    pub text: String,
    /// Context fields the text is based on, in the order they were read.
    pub used_fields: Vec<String>,
    /// Fields that were needed but absent.
    pub unavailable: Vec<UnavailableField>,
}

impl Answer {
    /// Returns true if every needed field was available.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unavailable.is_empty()
    }
}

/// Answers `question` from `ctx`.
#[must_use]
pub fn answer(question: &str, ctx: &AnalysisContext) -> Answer {
    let kind = QueryKind::classify(question);
    let mut view = Projection::new(ctx);
    let mut text = String::new();

    match kind {
        QueryKind::Summary | QueryKind::General => summary_text(&mut view, &mut text),
        QueryKind::Score => score_text(&mut view, &mut text),
        QueryKind::Competitors => competitors_text(&mut view, &mut text),
        QueryKind::Risks => risks_text(&mut view, &mut text),
        QueryKind::Strategy => strategy_text(&mut view, &mut text),
        QueryKind::Requirements => requirements_text(&mut view, &mut text),
    }

    if text.trim().is_empty() {
        text.push_str("The analysis holds no data for this question.");
    }
    if !view.unavailable.is_empty() {
        let missing: Vec<String> = view
            .unavailable
            .iter()
            .map(|u| format!("{} ({} {})", u.field, u.stage, u.status))
            .collect();
        let _ = write!(text, "\nNot available: {}.", missing.join(", "));
    }

    Answer {
        kind,
        text: text.trim().to_string(),
        used_fields: view.used,
        unavailable: view.unavailable,
    }
}

/// Tracks which fields an answer read.
struct Projection<'a> {
    ctx: &'a AnalysisContext,
    used: Vec<String>,
    unavailable: Vec<UnavailableField>,
}

impl<'a> Projection<'a> {
    fn new(ctx: &'a AnalysisContext) -> Self {
        Self {
            ctx,
            used: Vec::new(),
            unavailable: Vec::new(),
        }
    }

    fn take<T>(&mut self, field: &str, stage: StageName, value: Option<T>) -> Option<T> {
        if value.is_some() {
            if !self.used.iter().any(|f| f == field) {
                self.used.push(field.to_string());
            }
        } else if !self.unavailable.iter().any(|u| u.field == field) {
            self.unavailable.push(UnavailableField {
                field: field.to_string(),
                stage,
                status: self.ctx.stage(stage).describe(),
            });
        }
        value
    }

    fn extracted(&self) -> bool {
        self.ctx.status_of(StageName::Extraction).is_success()
    }

    fn requirements(&mut self) -> Option<&'a [Requirement]> {
        let ctx = self.ctx;
        let value = self.extracted().then(|| ctx.requirements());
        self.take("requirements", StageName::Extraction, value)
    }

    fn risk_flags(&mut self) -> Option<&'a BTreeSet<String>> {
        let ctx = self.ctx;
        let value = self.extracted().then(|| ctx.risk_flags());
        self.take("risk_flags", StageName::Extraction, value)
    }

    fn metadata(&mut self) -> Option<&'a RfpMetadata> {
        let value = self.ctx.rfp_metadata();
        self.take("rfp_metadata", StageName::Extraction, value)
    }

    fn criteria(&mut self) -> Option<&'a crate::model::EvaluationCriteria> {
        let value = self.ctx.evaluation_criteria();
        self.take("evaluation_criteria", StageName::Extraction, value)
    }

    fn matches(&mut self) -> Option<&'a [crate::model::MatchResult]> {
        let value = self.ctx.internal_matches();
        self.take("internal_matches", StageName::InternalMatcher, value)
    }

    fn profiles(&mut self) -> Option<&'a BTreeMap<String, CompetitorProfile>> {
        let value = self.ctx.competitor_profiles();
        self.take("competitor_profiles", StageName::CompetitorProfiler, value)
    }

    fn scoring(&mut self) -> Option<&'a ScoreBreakdown> {
        let value = self.ctx.scoring();
        self.take("scoring", StageName::Scoring, value)
    }

    fn strategy(&mut self) -> Option<&'a Strategy> {
        let value = self.ctx.strategy();
        self.take("strategy", StageName::Strategy, value)
    }
}

fn percent(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

fn summary_text(view: &mut Projection<'_>, out: &mut String) {
    if let Some(title) = view.metadata().and_then(|m| m.title.as_deref()) {
        let _ = writeln!(out, "RFP: {title}.");
    }
    if let Some(requirements) = view.requirements() {
        let mandatory = requirements.iter().filter(|r| r.is_mandatory).count();
        let _ = writeln!(
            out,
            "{} requirements ({mandatory} mandatory).",
            requirements.len()
        );
    }
    if let Some(scoring) = view.scoring() {
        let _ = writeln!(
            out,
            "Win probability {} ({} difficulty, confidence {:.2}).",
            percent(scoring.overall_probability),
            scoring.difficulty,
            scoring.confidence
        );
    }
    if let Some(strategy) = view.strategy() {
        let _ = writeln!(
            out,
            "{} differentiators and {} mitigations identified.",
            strategy.differentiators.len(),
            strategy.mitigations.len()
        );
    }
}

fn score_text(view: &mut Projection<'_>, out: &mut String) {
    let Some(scoring) = view.scoring() else {
        out.push_str("No win probability could be computed for this RFP.");
        return;
    };
    let _ = writeln!(
        out,
        "Estimated win probability is {} ({} difficulty, confidence {:.2}).",
        percent(scoring.overall_probability),
        scoring.difficulty,
        scoring.confidence
    );
    if !scoring.key_drivers.is_empty() {
        let _ = writeln!(out, "Key drivers: {}.", scoring.key_drivers.join(", "));
    }
    for (name, score) in &scoring.per_criterion {
        let _ = writeln!(
            out,
            "- {name} (weight {:.2}): fit {:.2} vs competitor {:.2}, contribution {:+.2}",
            score.weight, score.fit_score, score.competitor_advantage, score.contribution
        );
    }
    // Fit is zero for every criterion when there were no matches; say why.
    let _ = view.matches();
    let _ = view.profiles();
}

fn competitors_text(view: &mut Projection<'_>, out: &mut String) {
    let Some(profiles) = view.profiles() else {
        out.push_str("No competitor profiles are available.");
        return;
    };
    if profiles.is_empty() {
        out.push_str("No competitors were profiled.");
        return;
    }
    for (name, profile) in profiles {
        if profile.is_unknown() {
            let _ = writeln!(out, "- {name}: no data found.");
            continue;
        }
        let _ = write!(
            out,
            "- {name}: {} pricing, track record {:.2}",
            profile.price_positioning, profile.track_record_score
        );
        if !profile.capabilities.is_empty() {
            let _ = write!(out, ", capabilities: {}", profile.capabilities.join(", "));
        }
        out.push_str(".\n");
    }
    if let Some(scoring) = view.scoring() {
        let leads: Vec<&str> = scoring
            .per_criterion
            .iter()
            .filter(|(_, s)| s.resolved && s.differential() < 0.0)
            .map(|(name, _)| name.as_str())
            .collect();
        if !leads.is_empty() {
            let _ = writeln!(out, "Competitors lead on: {}.", leads.join(", "));
        }
    }
}

fn risks_text(view: &mut Projection<'_>, out: &mut String) {
    if let Some(flags) = view.risk_flags() {
        if flags.is_empty() {
            out.push_str("No risk flags were raised during extraction.\n");
        } else {
            for flag in flags {
                let _ = writeln!(out, "- {flag}");
            }
        }
    }
    if let Some(strategy) = view.strategy() {
        let external: Vec<&String> = strategy
            .swot
            .threats
            .iter()
            .filter(|t| !t.starts_with("Risk: "))
            .collect();
        if !external.is_empty() {
            out.push_str("Competitive threats:\n");
            for threat in external {
                let _ = writeln!(out, "- {threat}");
            }
        }
    }
}

fn strategy_text(view: &mut Projection<'_>, out: &mut String) {
    let Some(strategy) = view.strategy() else {
        out.push_str("No bid strategy is available.");
        return;
    };
    if let Some(narrative) = &strategy.narrative {
        let _ = writeln!(out, "{narrative}");
    }
    let gap_actions: Vec<String> = strategy
        .gap_actions
        .iter()
        .map(|g| g.message.clone())
        .collect();
    let sections: [(&str, &Vec<String>); 8] = [
        ("Differentiators", &strategy.differentiators),
        ("Mitigations", &strategy.mitigations),
        ("Skill gap actions", &gap_actions),
        ("Strengths", &strategy.swot.strengths),
        ("Weaknesses", &strategy.swot.weaknesses),
        ("Opportunities", &strategy.swot.opportunities),
        ("Threats", &strategy.swot.threats),
        ("Recommendations", &strategy.recommendations),
    ];
    for (heading, items) in sections {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{heading}:");
        for item in items {
            let _ = writeln!(out, "- {item}");
        }
    }
}

fn requirements_text(view: &mut Projection<'_>, out: &mut String) {
    if let Some(requirements) = view.requirements() {
        let mandatory = requirements.iter().filter(|r| r.is_mandatory).count();
        let _ = writeln!(
            out,
            "{} requirements, {mandatory} mandatory:",
            requirements.len()
        );
        for req in requirements {
            let flag = if req.is_mandatory { "mandatory" } else { "optional" };
            let criterion = req.criterion.as_deref().unwrap_or("untagged");
            let _ = writeln!(out, "- {} [{criterion}, {flag}] {}", req.id, req.text);
        }
    }
    if let Some(criteria) = view.criteria() {
        let weights: Vec<String> = criteria
            .iter()
            .map(|(name, weight)| format!("{name} {}", percent(weight)))
            .collect();
        let _ = writeln!(out, "Evaluation criteria: {}.", weights.join(", "));
    }
    if view.matches().is_some() {
        if let Some(readiness) = view.ctx.readiness() {
            let _ = writeln!(out, "Delivery readiness: {readiness}.");
        }
        let gaps = view.ctx.skill_gaps().unwrap_or_default();
        if gaps.is_empty() {
            out.push_str("Every mandatory requirement has a matching past project.\n");
        } else {
            out.push_str("Skill gaps:\n");
            for gap in &gaps {
                let _ = match gap.best_similarity {
                    Some(best) => writeln!(
                        out,
                        "- {} [{}] {}: best match {best:.2}",
                        gap.requirement_id, gap.category, gap.text
                    ),
                    None => writeln!(
                        out,
                        "- {} [{}] {}: no matching project",
                        gap.requirement_id, gap.category, gap.text
                    ),
                };
            }
        }
    }
}
