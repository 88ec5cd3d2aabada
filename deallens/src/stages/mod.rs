//! Analysis stages.
//!
//! Each stage reads what it needs from a shared, read-only
//! [`AnalysisContext`] and returns its output. Writing the output into the
//! context is the orchestrator's job, so two stages can run concurrently
//! against the same context without locking.

mod draft;
mod extraction;
mod matcher;
mod profiler;
mod scoring;
mod strategy;

pub use draft::{
    parse_text, scan_risk_keywords, DraftCriterion, DraftRequirement, DraftRisk, ExtractionDraft,
};
pub use extraction::{normalize_draft, ExtractionStage};
pub use matcher::InternalMatcher;
pub use profiler::CompetitorProfiler;
pub use scoring::{confidence, ScoringEngine, ScoringInput, PRIOR};
pub use strategy::{derive as derive_strategy, StrategyInput, StrategySynthesizer};

use crate::context::AnalysisContext;
use crate::core::StageName;
use crate::errors::StageError;
use async_trait::async_trait;
use std::fmt::Debug;

/// A unit of analysis work.
#[async_trait]
pub trait AnalysisStage: Send + Sync + Debug {
    /// What the stage produces.
    type Output: Send;

    /// Which stage this is.
    fn name(&self) -> StageName;

    /// Runs the stage against the current context.
    async fn execute(&self, ctx: &AnalysisContext) -> Result<Self::Output, StageError>;
}
