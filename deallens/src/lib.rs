//! # DealLens
//!
//! Multi-stage RFP analysis pipeline and win-probability scoring engine.
//!
//! An [`Orchestrator`](pipeline::Orchestrator) takes the text of a bid
//! document and a list of competitors and runs five stages over one
//! [`AnalysisContext`](context::AnalysisContext):
//!
//! - **Extraction**: requirements, weighted evaluation criteria, risk flags
//! - **Internal matching**: ranked past projects per requirement
//! - **Competitor profiling**: capabilities and positioning per competitor
//! - **Scoring**: `0.5 + Σ weight × (fit − competitor advantage)`, clamped
//! - **Strategy**: differentiators, mitigations, SWOT and recommendations
//!
//! Any stage may fail without aborting the run. The context's stage status
//! map records what happened to each stage, and the [`query`] layer answers
//! follow-up questions from whatever subset succeeded.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deallens::prelude::*;
//! use std::collections::BTreeMap;
//!
//! let orchestrator = Orchestrator::new(providers, AnalysisConfig::default());
//! let ctx = orchestrator
//!     .run(rfp_text, &["Acme".to_string()], BTreeMap::new())
//!     .await?;
//!
//! println!("{}", answer("What is our win probability?", &ctx).text);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod providers;
pub mod query;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::AnalysisConfig;
    pub use crate::context::{AnalysisContext, AnalysisSummary, RawInput};
    pub use crate::core::{StageName, StageRecord, StageStatus};
    pub use crate::errors::{DealLensError, ProviderError, ProviderErrorKind, StageError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::model::{
        ActionType, CompetitorProfile, CriterionScore, Difficulty, EvaluationCriteria, GapAction,
        MatchResult, Readiness, Requirement, ScoreBreakdown, SkillGap, Strategy,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::Orchestrator;
    pub use crate::providers::{
        Completion, CompetitorLookup, CompetitorRecord, CompletionProvider, Providers,
        RetrievalCandidate, RetrievalProvider,
    };
    pub use crate::query::{answer, Answer, QueryKind};
}

