//! In-memory capability providers.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::model::{normalize_text, text_tokens};
use crate::providers::{
    Completion, CompetitorLookup, CompetitorRecord, CompletionProvider, RetrievalCandidate,
    RetrievalProvider,
};

/// Returns the same completion for every prompt and records the prompts.
#[derive(Debug)]
pub struct StaticCompletion {
    response: Completion,
    prompts: Mutex<Vec<String>>,
}

impl StaticCompletion {
    /// Creates a provider answering with `response`.
    #[must_use]
    pub fn new(response: Completion) -> Self {
        Self {
            response,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answers with structured JSON.
    #[must_use]
    pub fn json(value: serde_json::Value) -> Self {
        Self::new(Completion::Structured(value))
    }

    /// Answers with free text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Completion::Text(text.into()))
    }

    /// Returns the number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    /// Returns every prompt received.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for StaticCompletion {
    async fn complete(
        &self,
        prompt: &str,
        _schema_hint: &serde_json::Value,
    ) -> Result<Completion, ProviderError> {
        self.prompts.lock().push(prompt.to_string());
        Ok(self.response.clone())
    }
}

/// Fails every call with the same error.
#[derive(Debug, Clone)]
pub struct FailingCompletion {
    error: ProviderError,
}

impl FailingCompletion {
    /// Creates a provider failing with `error`.
    #[must_use]
    pub fn new(error: ProviderError) -> Self {
        Self { error }
    }

    /// Fails as if the model endpoint were down.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(ProviderError::unavailable("completion endpoint unreachable"))
    }
}

#[async_trait]
impl CompletionProvider for FailingCompletion {
    async fn complete(
        &self,
        _prompt: &str,
        _schema_hint: &serde_json::Value,
    ) -> Result<Completion, ProviderError> {
        Err(self.error.clone())
    }
}

/// Sleeps before answering. Pair with a short stage timeout.
#[derive(Debug, Clone)]
pub struct SlowCompletion {
    delay: Duration,
    response: Completion,
}

impl SlowCompletion {
    /// Creates a provider that answers with `response` after `delay`.
    #[must_use]
    pub fn new(delay: Duration, response: Completion) -> Self {
        Self { delay, response }
    }
}

#[async_trait]
impl CompletionProvider for SlowCompletion {
    async fn complete(
        &self,
        _prompt: &str,
        _schema_hint: &serde_json::Value,
    ) -> Result<Completion, ProviderError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.response.clone())
    }
}

#[derive(Debug, Clone)]
struct StoredProject {
    id: String,
    summary: String,
    tokens: BTreeSet<String>,
    completed_on: Option<NaiveDate>,
}

/// Project store searched by token overlap.
///
/// Similarity is the share of query tokens found in the project description.
/// Pinned hits return a fixed candidate whenever the query contains a phrase,
/// which keeps expected scores exact in tests.
#[derive(Debug, Default)]
pub struct InMemoryRetrieval {
    projects: Vec<StoredProject>,
    pinned: Vec<(String, RetrievalCandidate)>,
    failure: Option<ProviderError>,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl InMemoryRetrieval {
    /// Creates an empty store. Every search succeeds with no candidates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a searchable project.
    #[must_use]
    pub fn with_project(mut self, id: impl Into<String>, description: impl Into<String>) -> Self {
        let summary = description.into();
        self.projects.push(StoredProject {
            id: id.into(),
            tokens: text_tokens(&summary),
            summary,
            completed_on: None,
        });
        self
    }

    /// Adds a searchable project with a completion date.
    #[must_use]
    pub fn with_dated_project(
        self,
        id: impl Into<String>,
        description: impl Into<String>,
        completed_on: NaiveDate,
    ) -> Self {
        let mut store = self.with_project(id, description);
        if let Some(last) = store.projects.last_mut() {
            last.completed_on = Some(completed_on);
        }
        store
    }

    /// Returns `candidate` for every query containing `phrase` (case-insensitive).
    #[must_use]
    pub fn with_pinned(mut self, phrase: impl Into<String>, candidate: RetrievalCandidate) -> Self {
        self.pinned.push((phrase.into().to_lowercase(), candidate));
        self
    }

    /// Makes every search fail with `error`.
    #[must_use]
    pub fn failing(mut self, error: ProviderError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Delays every search.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns every query received, in arrival order.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl RetrievalProvider for InMemoryRetrieval {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalCandidate>, ProviderError> {
        self.queries.lock().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let lowered = query.to_lowercase();
        let mut hits: Vec<RetrievalCandidate> = self
            .pinned
            .iter()
            .filter(|(phrase, _)| lowered.contains(phrase.as_str()))
            .map(|(_, candidate)| candidate.clone())
            .collect();

        let query_tokens = text_tokens(query);
        if !query_tokens.is_empty() {
            for project in &self.projects {
                let shared = query_tokens.intersection(&project.tokens).count();
                if shared == 0 {
                    continue;
                }
                #[allow(clippy::cast_precision_loss)]
                let similarity = shared as f64 / query_tokens.len() as f64;
                let mut candidate = RetrievalCandidate::new(project.id.clone(), similarity)
                    .with_summary(project.summary.clone());
                candidate.completed_on = project.completed_on;
                hits.push(candidate);
            }
        }

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.project_id.cmp(&b.project_id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Competitor records keyed by normalized name.
#[derive(Debug, Default)]
pub struct InMemoryCompetitorDirectory {
    records: BTreeMap<String, CompetitorRecord>,
    failing: BTreeSet<String>,
}

impl InMemoryCompetitorDirectory {
    /// Creates an empty directory. Every lookup returns not-found.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record under its own name.
    #[must_use]
    pub fn with_record(mut self, record: CompetitorRecord) -> Self {
        self.records.insert(normalize_text(&record.name), record);
        self
    }

    /// Makes lookups for `name` fail.
    #[must_use]
    pub fn failing_for(mut self, name: &str) -> Self {
        self.failing.insert(normalize_text(name));
        self
    }
}

#[async_trait]
impl CompetitorLookup for InMemoryCompetitorDirectory {
    async fn lookup(&self, name: &str) -> Result<Option<CompetitorRecord>, ProviderError> {
        let key = normalize_text(name);
        if self.failing.contains(&key) {
            return Err(ProviderError::unavailable(format!(
                "competitor database refused lookup for '{name}'"
            )));
        }
        Ok(self.records.get(&key).cloned())
    }
}
