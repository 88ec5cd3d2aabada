//! Internal project matches.

use super::Requirement;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Similarity at which a project counts as covering a requirement.
pub const COVERAGE_THRESHOLD: f64 = 0.5;

/// A past project ranked against the RFP requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Project identifier in the knowledge base.
    pub project_id: String,
    /// Best similarity across all requirements, in `[0, 1]`. Used for ranking.
    pub similarity_score: f64,
    /// Why this project matched.
    pub fit_notes: String,
    /// Similarity per requirement id this project was retrieved for.
    #[serde(default)]
    pub requirement_scores: BTreeMap<String, f64>,
    /// When the project was completed, used to break ties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_on: Option<NaiveDate>,
}

impl MatchResult {
    /// Creates a match without requirement links.
    #[must_use]
    pub fn new(project_id: impl Into<String>, similarity_score: f64) -> Self {
        Self {
            project_id: project_id.into(),
            similarity_score,
            fit_notes: String::new(),
            requirement_scores: BTreeMap::new(),
            completed_on: None,
        }
    }

    /// Links the match to requirements, each at the overall similarity.
    #[must_use]
    pub fn covering(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let score = self.similarity_score;
        self.requirement_scores = ids.into_iter().map(|id| (id.into(), score)).collect();
        self
    }

    /// Links the match to one requirement at its own similarity.
    #[must_use]
    pub fn with_requirement_score(mut self, id: impl Into<String>, score: f64) -> Self {
        self.requirement_scores.insert(id.into(), score.clamp(0.0, 1.0));
        self
    }

    /// Sets the completion date.
    #[must_use]
    pub fn completed_on(mut self, date: NaiveDate) -> Self {
        self.completed_on = Some(date);
        self
    }

    /// Sets the fit notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.fit_notes = notes.into();
        self
    }

    /// Linked requirement ids, in order.
    pub fn requirement_ids(&self) -> impl Iterator<Item = &str> {
        self.requirement_scores.keys().map(String::as_str)
    }

    /// Similarity for one requirement, if the project was retrieved for it.
    #[must_use]
    pub fn score_for(&self, id: &str) -> Option<f64> {
        self.requirement_scores.get(id).copied()
    }

    /// Best similarity restricted to `ids`, or `None` if none are linked.
    #[must_use]
    pub fn best_score_among(&self, ids: &BTreeSet<&str>) -> Option<f64> {
        self.requirement_scores
            .iter()
            .filter(|(id, _)| ids.contains(id.as_str()))
            .map(|(_, score)| *score)
            .reduce(f64::max)
    }
}

/// Best similarity any match reached for each requirement id.
fn best_scores(matches: &[MatchResult]) -> BTreeMap<&str, f64> {
    let mut best: BTreeMap<&str, f64> = BTreeMap::new();
    for m in matches {
        for (id, score) in &m.requirement_scores {
            let entry = best.entry(id.as_str()).or_insert(*score);
            *entry = entry.max(*score);
        }
    }
    best
}

/// Ranking order: similarity descending, then more recent project first
/// (undated last), then `project_id` ascending.
#[must_use]
pub fn compare_rank(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.similarity_score
        .total_cmp(&a.similarity_score)
        .then_with(|| match (a.completed_on, b.completed_on) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.project_id.cmp(&b.project_id))
}

/// How ready the organization is to deliver the mandatory requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// At least 80% of mandatory requirements have a matching project.
    High,
    /// At least 50%.
    Medium,
    /// Below 50%.
    Low,
}

impl Readiness {
    /// Grades coverage of mandatory requirements by the matches. A requirement
    /// is covered when some project reaches [`COVERAGE_THRESHOLD`] on it.
    ///
    /// With no mandatory requirements all requirements are considered.
    #[must_use]
    pub fn assess(matches: &[MatchResult], requirements: &[Requirement]) -> Self {
        let mandatory: Vec<&Requirement> = requirements.iter().filter(|r| r.is_mandatory).collect();
        let pool: Vec<&Requirement> = if mandatory.is_empty() {
            requirements.iter().collect()
        } else {
            mandatory
        };
        if pool.is_empty() {
            return Self::Low;
        }

        let best = best_scores(matches);
        let hit = pool
            .iter()
            .filter(|r| best.get(r.id.as_str()).is_some_and(|s| *s >= COVERAGE_THRESHOLD))
            .count();

        #[allow(clippy::cast_precision_loss)]
        let share = hit as f64 / pool.len() as f64;
        if share >= 0.8 {
            Self::High
        } else if share >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// A mandatory requirement no past project covers well enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillGap {
    /// Requirement id.
    pub requirement_id: String,
    /// Requirement text.
    pub text: String,
    /// Requirement category.
    pub category: String,
    /// Best similarity any project reached, `None` when nothing matched.
    pub best_similarity: Option<f64>,
}

/// How far a requirement is from being covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSeverity {
    /// Some project matched, below the coverage threshold.
    Weak,
    /// No project matched at all.
    Missing,
}

impl SkillGap {
    /// Finds the mandatory requirements left uncovered by `matches`, in
    /// requirement order.
    #[must_use]
    pub fn find(matches: &[MatchResult], requirements: &[Requirement]) -> Vec<Self> {
        let best = best_scores(matches);
        requirements
            .iter()
            .filter(|r| r.is_mandatory)
            .filter_map(|r| {
                let score = best.get(r.id.as_str()).copied();
                if score.is_some_and(|s| s >= COVERAGE_THRESHOLD) {
                    return None;
                }
                Some(Self {
                    requirement_id: r.id.clone(),
                    text: r.text.clone(),
                    category: r.category.clone(),
                    best_similarity: score,
                })
            })
            .collect()
    }

    /// Weak when something matched, missing otherwise.
    #[must_use]
    pub fn severity(&self) -> GapSeverity {
        if self.best_similarity.is_some() {
            GapSeverity::Weak
        } else {
            GapSeverity::Missing
        }
    }
}

impl fmt::Display for GapSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weak => write!(f, "weak"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rank_order_with_tie_breaks() {
        let mut matches = vec![
            MatchResult::new("P-b", 0.7).completed_on(date(2021, 1, 1)),
            MatchResult::new("P-old", 0.8).completed_on(date(2019, 5, 1)),
            MatchResult::new("P-a", 0.7).completed_on(date(2021, 1, 1)),
            MatchResult::new("P-new", 0.8).completed_on(date(2023, 5, 1)),
            MatchResult::new("P-undated", 0.8),
        ];
        matches.sort_by(compare_rank);

        let ids: Vec<&str> = matches.iter().map(|m| m.project_id.as_str()).collect();
        assert_eq!(ids, vec!["P-new", "P-old", "P-undated", "P-a", "P-b"]);
    }

    #[test]
    fn test_readiness_counts_mandatory_only() {
        let requirements = vec![
            Requirement::new("REQ-001", "a", "Technical", true),
            Requirement::new("REQ-002", "b", "Technical", true),
            Requirement::new("REQ-003", "c", "Technical", false),
        ];
        let matches = vec![MatchResult::new("P1", 0.9).covering(["REQ-001", "REQ-003"])];
        assert_eq!(Readiness::assess(&matches, &requirements), Readiness::Medium);

        let matches = vec![MatchResult::new("P1", 0.9).covering(["REQ-001", "REQ-002"])];
        assert_eq!(Readiness::assess(&matches, &requirements), Readiness::High);

        assert_eq!(Readiness::assess(&[], &requirements), Readiness::Low);
    }

    #[test]
    fn test_weak_hits_do_not_count_as_coverage() {
        let requirements = vec![
            Requirement::new("REQ-001", "kubernetes platform", "Technical", true),
            Requirement::new("REQ-002", "fixed price delivery", "Price", true),
        ];
        let matches = vec![MatchResult::new("P-1", 0.9)
            .with_requirement_score("REQ-001", 0.9)
            .with_requirement_score("REQ-002", 0.05)];

        assert_eq!(Readiness::assess(&matches, &requirements), Readiness::Medium);
        assert_eq!(matches[0].score_for("REQ-002"), Some(0.05));
        let ids = BTreeSet::from(["REQ-002"]);
        assert_eq!(matches[0].best_score_among(&ids), Some(0.05));
    }

    #[test]
    fn test_skill_gaps_for_uncovered_mandatory_requirements() {
        let requirements = vec![
            Requirement::new("REQ-001", "kubernetes platform", "Technical", true),
            Requirement::new("REQ-002", "fixed price delivery", "Price", true),
            Requirement::new("REQ-003", "on-site training", "Delivery", true),
            Requirement::new("REQ-004", "user forum", "Delivery", false),
        ];
        let matches = vec![
            MatchResult::new("P-1", 0.9)
                .with_requirement_score("REQ-001", 0.9)
                .with_requirement_score("REQ-002", 0.2),
            MatchResult::new("P-2", 0.3).with_requirement_score("REQ-002", 0.3),
        ];

        let gaps = SkillGap::find(&matches, &requirements);
        let ids: Vec<&str> = gaps.iter().map(|g| g.requirement_id.as_str()).collect();
        assert_eq!(ids, vec!["REQ-002", "REQ-003"]);
        assert_eq!(gaps[0].best_similarity, Some(0.3));
        assert_eq!(gaps[0].severity(), GapSeverity::Weak);
        assert_eq!(gaps[1].severity(), GapSeverity::Missing);
        assert_eq!(gaps[1].category, "Delivery");
    }
}
