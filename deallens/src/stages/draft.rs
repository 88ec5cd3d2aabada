//! Raw extraction drafts and the plain-text fallback parser.
//!
//! A completion provider either honours the schema hint and returns JSON, or
//! returns prose. Both end up as an [`ExtractionDraft`] that the extraction
//! stage then normalizes.

use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Unnormalized extraction result.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ExtractionDraft {
    /// Requirements in document order.
    #[serde(default)]
    pub requirements: Vec<DraftRequirement>,
    /// Evaluation criteria with optional raw weights.
    #[serde(default, alias = "criteria")]
    pub evaluation_criteria: Vec<DraftCriterion>,
    /// Risk notes.
    #[serde(default, alias = "risks")]
    pub risk_flags: Vec<DraftRisk>,
    /// Project title.
    #[serde(default)]
    pub title: Option<String>,
    /// Timeline statement.
    #[serde(default)]
    pub timeline: Option<String>,
    /// Budget statement.
    #[serde(default, alias = "budget")]
    pub budget_range: Option<String>,
    /// Submission format statement.
    #[serde(default, alias = "submission")]
    pub submission_format: Option<String>,
}

/// A requirement as the provider reported it.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DraftRequirement {
    /// Identifier, if the provider assigned one.
    #[serde(default)]
    pub id: Option<String>,
    /// Requirement text.
    #[serde(alias = "description")]
    pub text: String,
    /// Category label.
    #[serde(default)]
    pub category: Option<String>,
    /// Explicit mandatory flag.
    #[serde(default, alias = "mandatory")]
    pub is_mandatory: Option<bool>,
    /// Priority label ("mandatory", "optional", ...), used when no flag is given.
    #[serde(default)]
    pub priority: Option<String>,
    /// Criterion the requirement is scored under.
    #[serde(default)]
    pub criterion: Option<String>,
}

impl DraftRequirement {
    /// Resolves the mandatory flag. Requirements default to mandatory.
    #[must_use]
    pub fn mandatory(&self) -> bool {
        self.is_mandatory.unwrap_or_else(|| {
            self.priority
                .as_deref()
                .map_or(true, |p| !is_optional_label(p))
        })
    }
}

fn is_optional_label(label: &str) -> bool {
    matches!(
        label.trim().to_lowercase().as_str(),
        "optional" | "recommended" | "nice to have" | "should" | "may"
    )
}

/// A criterion as the provider reported it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DraftCriterion {
    /// Criterion name.
    #[serde(alias = "item")]
    pub name: String,
    /// Raw weight; fractions, points and percentages all normalize the same way.
    #[serde(default)]
    pub weight: Option<f64>,
}

/// A risk note, either bare text or an object with a description.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DraftRisk {
    /// Bare note.
    Note(String),
    /// Structured note.
    Detailed {
        /// Risk class.
        #[serde(default)]
        risk_type: Option<String>,
        /// What the risk is.
        description: String,
    },
}

impl DraftRisk {
    /// Renders the note as a single line.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Note(note) => note.trim().to_string(),
            Self::Detailed {
                risk_type: Some(kind),
                description,
            } if !kind.trim().is_empty() => format!("{}: {}", kind.trim(), description.trim()),
            Self::Detailed { description, .. } => description.trim().to_string(),
        }
    }
}

static REQUIREMENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:[-*]\s*)?requirement\s*(?:\[(?P<category>[^\]]+)\])?\s*(?:\((?P<priority>[a-z ]+)\))?\s*:\s*(?P<text>.+?)\s*$",
    )
    .expect("requirement line pattern")
});

static CRITERION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:[-*]\s*)?criterion\s*:\s*(?P<name>[^(]+?)\s*(?:\(\s*(?P<weight>\d+(?:\.\d+)?)\s*(?P<percent>%)?\s*\))?\s*$",
    )
    .expect("criterion line pattern")
});

static RISK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:[-*]\s*)?risk\s*:\s*(?P<note>.+?)\s*$").expect("risk line pattern")
});

static FIELD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?P<key>title|timeline|budget|submission)\s*:\s*(?P<value>.+?)\s*$")
        .expect("field line pattern")
});

/// Parses line-oriented provider output.
///
/// Recognized lines:
/// `Requirement [Category] (mandatory|optional): text`,
/// `Criterion: Name (0.6)` (also `60` or `60%`), `Risk: note`,
/// `Title:`, `Timeline:`, `Budget:`, `Submission:`. Everything else is ignored.
#[must_use]
pub fn parse_text(text: &str) -> ExtractionDraft {
    let mut draft = ExtractionDraft::default();

    for line in text.lines() {
        if let Some(caps) = REQUIREMENT_LINE.captures(line) {
            draft.requirements.push(DraftRequirement {
                id: None,
                text: caps["text"].to_string(),
                category: caps.name("category").map(|m| m.as_str().trim().to_string()),
                is_mandatory: None,
                priority: caps.name("priority").map(|m| m.as_str().to_string()),
                criterion: None,
            });
        } else if let Some(caps) = CRITERION_LINE.captures(line) {
            let weight = caps
                .name("weight")
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .map(|w| if caps.name("percent").is_some() { w / 100.0 } else { w });
            draft.evaluation_criteria.push(DraftCriterion {
                name: caps["name"].to_string(),
                weight,
            });
        } else if let Some(caps) = RISK_LINE.captures(line) {
            draft.risk_flags.push(DraftRisk::Note(caps["note"].to_string()));
        } else if let Some(caps) = FIELD_LINE.captures(line) {
            let value = Some(caps["value"].to_string());
            match caps["key"].to_lowercase().as_str() {
                "title" => draft.title = draft.title.or(value),
                "timeline" => draft.timeline = draft.timeline.or(value),
                "budget" => draft.budget_range = draft.budget_range.or(value),
                _ => draft.submission_format = draft.submission_format.or(value),
            }
        }
    }

    draft
}

struct RiskPattern {
    regex: Regex,
    label: &'static str,
}

fn risk_pattern(regex: &str, label: &'static str) -> RiskPattern {
    RiskPattern {
        regex: Regex::new(regex).expect("risk keyword pattern"),
        label,
    }
}

static RISK_KEYWORDS: LazyLock<Vec<RiskPattern>> = LazyLock::new(|| {
    vec![
        risk_pattern(r"(?i)\b(contradict\w*|conflicting|inconsistent)\b", "contradiction"),
        risk_pattern(r"(?i)\b(ambiguous|unclear|tbd|to be determined)\b", "ambiguity"),
        risk_pattern(r"(?i)\b(legal|regulat\w*|compliance|liabilit\w*)\b", "legal"),
        risk_pattern(r"(?i)\b(security|encrypt\w*|authenticat\w*)\b", "security"),
        risk_pattern(r"(?i)\b(licen[cs]\w*|copyright|patent\w*)\b", "license"),
    ]
});

/// Scans raw document text for risk keywords. One note per risk class.
#[must_use]
pub fn scan_risk_keywords(text: &str) -> BTreeSet<String> {
    RISK_KEYWORDS
        .iter()
        .filter_map(|p| {
            p.regex.find(text).map(|m| {
                format!(
                    "{} risk: '{}' mentioned; needs review",
                    p.label,
                    m.as_str().to_lowercase()
                )
            })
        })
        .collect()
}
