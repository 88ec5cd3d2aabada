//! Domain data written into the analysis context by the stages.

mod competitor;
mod criteria;
mod matching;
mod requirement;
mod scoring;
mod strategy;

pub use competitor::{CompetitorProfile, PricePositioning};
pub use criteria::{EvaluationCriteria, WeightError};
pub use matching::{
    compare_rank, GapSeverity, MatchResult, Readiness, SkillGap, COVERAGE_THRESHOLD,
};
pub use requirement::{normalize_text, text_tokens, Requirement, RfpMetadata};
pub use scoring::{CriterionScore, Difficulty, ScoreBreakdown};
pub use strategy::{ActionItem, ActionType, GapAction, Strategy, Swot};
