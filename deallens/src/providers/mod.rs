//! Capability traits for the external collaborators.
//!
//! The engine never talks to a language model, vector store or competitor
//! database directly. It goes through these narrow traits so each backend can
//! be swapped or mocked independently.

use crate::errors::ProviderError;
use crate::model::{CompetitorProfile, PricePositioning};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Result of a completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Completion {
    /// The provider honoured the schema hint and returned JSON.
    Structured(serde_json::Value),
    /// The provider returned free text.
    Text(String),
}

impl Completion {
    /// Returns the JSON payload, parsing text that looks like a JSON object.
    #[must_use]
    pub fn as_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Structured(value) => Some(value.clone()),
            Self::Text(text) => {
                let trimmed = text.trim();
                if trimmed.starts_with('{') {
                    serde_json::from_str(trimmed).ok()
                } else {
                    None
                }
            }
        }
    }

    /// Returns the raw text, rendering structured values as JSON.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Structured(value) => value.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

/// Protocol for text completion (a language model).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Completes `prompt`, asking for output shaped like `schema_hint`.
    async fn complete(
        &self,
        prompt: &str,
        schema_hint: &serde_json::Value,
    ) -> Result<Completion, ProviderError>;
}

/// A knowledge-base hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    /// Project identifier.
    pub project_id: String,
    /// Similarity reported by the backend; expected in `[0, 1]`.
    pub similarity: f64,
    /// Project completion date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_on: Option<NaiveDate>,
    /// Short description of the project.
    #[serde(default)]
    pub summary: String,
}

impl RetrievalCandidate {
    /// Creates a candidate.
    #[must_use]
    pub fn new(project_id: impl Into<String>, similarity: f64) -> Self {
        Self {
            project_id: project_id.into(),
            similarity,
            completed_on: None,
            summary: String::new(),
        }
    }

    /// Sets the completion date.
    #[must_use]
    pub fn completed_on(mut self, date: NaiveDate) -> Self {
        self.completed_on = Some(date);
        self
    }

    /// Sets the summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }
}

/// Protocol for similarity search over past projects.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RetrievalProvider: Send + Sync {
    /// Returns up to `top_k` candidates, best first. An empty result is valid.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalCandidate>, ProviderError>;
}

/// Raw competitor data as stored by the lookup backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompetitorRecord {
    /// Competitor name.
    pub name: String,
    /// Capability keywords or phrases.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Free-form pricing label ("premium", "standard", "low").
    #[serde(default)]
    pub price_positioning: String,
    /// Historical win record; clamped to `[0, 1]` when profiled.
    #[serde(default)]
    pub track_record_score: f64,
    /// Known strengths.
    #[serde(default)]
    pub strengths: Vec<String>,
    /// Known weaknesses.
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

impl CompetitorRecord {
    /// Converts the record into a profile.
    #[must_use]
    pub fn into_profile(self) -> CompetitorProfile {
        let track_record_score = if self.track_record_score.is_finite() {
            self.track_record_score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        CompetitorProfile {
            capabilities: self.capabilities,
            price_positioning: PricePositioning::parse(&self.price_positioning),
            track_record_score,
            strengths: self.strengths,
            weaknesses: self.weaknesses,
            known: true,
        }
    }
}

/// Protocol for competitor data lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompetitorLookup: Send + Sync {
    /// Looks up one competitor. `Ok(None)` means not found.
    async fn lookup(&self, name: &str) -> Result<Option<CompetitorRecord>, ProviderError>;
}

/// The set of capabilities an orchestrator runs against.
#[derive(Clone)]
pub struct Providers {
    /// Text completion.
    pub completion: Arc<dyn CompletionProvider>,
    /// Project retrieval.
    pub retrieval: Arc<dyn RetrievalProvider>,
    /// Competitor lookup.
    pub competitors: Arc<dyn CompetitorLookup>,
}

impl Providers {
    /// Bundles the three capabilities.
    #[must_use]
    pub fn new(
        completion: Arc<dyn CompletionProvider>,
        retrieval: Arc<dyn RetrievalProvider>,
        competitors: Arc<dyn CompetitorLookup>,
    ) -> Self {
        Self {
            completion,
            retrieval,
            competitors,
        }
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}
