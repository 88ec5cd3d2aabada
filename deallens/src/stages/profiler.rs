//! Competitor profiler.

use super::AnalysisStage;
use crate::context::AnalysisContext;
use crate::core::StageName;
use crate::errors::StageError;
use crate::model::{CompetitorProfile, Requirement};
use crate::providers::CompetitorLookup;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Builds one profile per requested competitor.
pub struct CompetitorProfiler {
    lookup: Arc<dyn CompetitorLookup>,
}

impl CompetitorProfiler {
    /// Creates the profiler.
    #[must_use]
    pub fn new(lookup: Arc<dyn CompetitorLookup>) -> Self {
        Self { lookup }
    }

    /// Looks up every competitor concurrently.
    ///
    /// A failed or empty lookup yields the unknown sentinel for that name; the
    /// stage itself only fails when the list is empty or contains a blank name.
    #[instrument(skip_all, fields(competitors = competitor_names.len()))]
    pub async fn profile(
        &self,
        competitor_names: &[String],
        requirements: &[Requirement],
    ) -> Result<BTreeMap<String, CompetitorProfile>, StageError> {
        if competitor_names.is_empty() {
            return Err(StageError::Profiling("competitor list is empty".to_string()));
        }
        if competitor_names.iter().any(|n| n.trim().is_empty()) {
            return Err(StageError::Profiling(
                "competitor list contains a blank name".to_string(),
            ));
        }

        let lookups = competitor_names.iter().map(|n| self.lookup.lookup(n));
        let responses = join_all(lookups).await;
        let all: Vec<&Requirement> = requirements.iter().collect();

        let mut profiles = BTreeMap::new();
        for (name, response) in competitor_names.iter().zip(responses) {
            let profile = match response {
                Ok(Some(record)) => record.into_profile(),
                Ok(None) => {
                    warn!(competitor = %name, "competitor not found; using unknown profile");
                    CompetitorProfile::unknown()
                }
                Err(e) => {
                    warn!(competitor = %name, error = %e, "competitor lookup failed; using unknown profile");
                    CompetitorProfile::unknown()
                }
            };
            debug!(
                competitor = %name,
                overlap = profile.capability_overlap(&all),
                "competitor profiled"
            );
            profiles.insert(name.clone(), profile);
        }
        Ok(profiles)
    }
}

impl fmt::Debug for CompetitorProfiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompetitorProfiler").finish_non_exhaustive()
    }
}

#[async_trait]
impl AnalysisStage for CompetitorProfiler {
    type Output = BTreeMap<String, CompetitorProfile>;

    fn name(&self) -> StageName {
        StageName::CompetitorProfiler
    }

    async fn execute(&self, ctx: &AnalysisContext) -> Result<Self::Output, StageError> {
        self.profile(ctx.competitor_names(), ctx.requirements()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::model::PricePositioning;
    use crate::providers::{CompetitorRecord, MockCompetitorLookup};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_lookup_failures_become_unknown() {
        let mut mock = MockCompetitorLookup::new();
        mock.expect_lookup().returning(|name| match name {
            "Acme" => Ok(Some(CompetitorRecord {
                name: "Acme".to_string(),
                capabilities: vec!["cloud".to_string()],
                price_positioning: "low".to_string(),
                track_record_score: 0.8,
                ..Default::default()
            })),
            "Globex" => Ok(None),
            _ => Err(ProviderError::unavailable("directory down")),
        });

        let profiler = CompetitorProfiler::new(Arc::new(mock));
        let profiles = profiler
            .profile(&names(&["Acme", "Globex", "Initech"]), &[])
            .await
            .unwrap();

        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles["Acme"].price_positioning, PricePositioning::Low);
        assert!(profiles["Acme"].known);
        assert_eq!(profiles["Globex"], CompetitorProfile::unknown());
        assert_eq!(profiles["Initech"], CompetitorProfile::unknown());
    }

    #[tokio::test]
    async fn test_empty_or_blank_list_fails() {
        let profiler = CompetitorProfiler::new(Arc::new(MockCompetitorLookup::new()));

        let err = profiler.profile(&[], &[]).await.unwrap_err();
        assert_eq!(err.kind(), "ProfilingError");

        let err = profiler.profile(&names(&["Acme", ""]), &[]).await.unwrap_err();
        assert!(err.to_string().contains("blank"));
    }
}
