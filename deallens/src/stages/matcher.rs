//! Internal matcher: ranks past projects against the requirements.

use super::AnalysisStage;
use crate::context::AnalysisContext;
use crate::core::StageName;
use crate::errors::StageError;
use crate::model::{compare_rank, MatchResult, Requirement};
use crate::providers::{RetrievalCandidate, RetrievalProvider};
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Retrieves and ranks the organization's past projects.
pub struct InternalMatcher {
    retrieval: Arc<dyn RetrievalProvider>,
    top_k: usize,
}

#[derive(Default)]
struct ProjectHits {
    similarity: f64,
    requirement_scores: BTreeMap<String, f64>,
    completed_on: Option<NaiveDate>,
    summary: String,
}

impl ProjectHits {
    fn absorb(&mut self, requirement_id: &str, candidate: RetrievalCandidate, similarity: f64) {
        if similarity > self.similarity || self.requirement_scores.is_empty() {
            self.similarity = similarity.max(self.similarity);
            if !candidate.summary.trim().is_empty() {
                self.summary = candidate.summary.trim().to_string();
            }
        }
        let score = self
            .requirement_scores
            .entry(requirement_id.to_string())
            .or_insert(similarity);
        *score = score.max(similarity);
        self.completed_on = self.completed_on.max(candidate.completed_on);
    }

    fn into_match(self, project_id: String) -> MatchResult {
        let hits: Vec<String> = self
            .requirement_scores
            .iter()
            .map(|(id, score)| format!("{id} ({score:.2})"))
            .collect();
        let mut notes = format!("matches {}", hits.join(", "));
        if !self.summary.is_empty() {
            notes.push_str("; ");
            notes.push_str(&self.summary);
        }
        MatchResult {
            project_id,
            similarity_score: self.similarity,
            fit_notes: notes,
            requirement_scores: self.requirement_scores,
            completed_on: self.completed_on,
        }
    }
}

impl InternalMatcher {
    /// Creates a matcher keeping at most `top_k` results.
    #[must_use]
    pub fn new(retrieval: Arc<dyn RetrievalProvider>, top_k: usize) -> Self {
        Self {
            retrieval,
            top_k: top_k.max(1),
        }
    }

    /// Runs one query per requirement and merges the hits per project.
    ///
    /// Zero hits is a successful empty result. Any failing query fails the
    /// whole stage with `RetrievalError`.
    #[instrument(skip_all, fields(requirements = requirements.len(), top_k = self.top_k))]
    pub async fn match_requirements(
        &self,
        requirements: &[Requirement],
    ) -> Result<Vec<MatchResult>, StageError> {
        let queries = requirements
            .iter()
            .map(|req| self.retrieval.search(&req.text, self.top_k));
        let responses = join_all(queries).await;

        let mut projects: BTreeMap<String, ProjectHits> = BTreeMap::new();
        for (req, response) in requirements.iter().zip(responses) {
            let candidates = response
                .map_err(|e| StageError::Retrieval(format!("query for {} failed: {e}", req.id)))?;
            for candidate in candidates {
                if !candidate.similarity.is_finite() {
                    debug!(project_id = %candidate.project_id, "dropping non-finite similarity");
                    continue;
                }
                let similarity = candidate.similarity.clamp(0.0, 1.0);
                projects
                    .entry(candidate.project_id.clone())
                    .or_default()
                    .absorb(&req.id, candidate, similarity);
            }
        }

        let mut matches: Vec<MatchResult> = projects
            .into_iter()
            .map(|(id, hits)| hits.into_match(id))
            .collect();
        matches.sort_by(compare_rank);
        matches.truncate(self.top_k);

        debug!(matches = matches.len(), "internal matches ranked");
        Ok(matches)
    }
}

impl fmt::Debug for InternalMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalMatcher")
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AnalysisStage for InternalMatcher {
    type Output = Vec<MatchResult>;

    fn name(&self) -> StageName {
        StageName::InternalMatcher
    }

    async fn execute(&self, ctx: &AnalysisContext) -> Result<Self::Output, StageError> {
        self.match_requirements(ctx.requirements()).await
    }
}
