//! The analysis orchestrator.
//!
//! Runs Extraction, then the Internal Matcher and Competitor Profiler
//! concurrently, then Scoring and Strategy. Each stage gets its own time
//! budget. Stage errors are recorded in the context's stage status map and
//! never returned; only boundary violations and internal contract breaches
//! surface as [`DealLensError`].

use super::timeout::within_budget;
use crate::cancellation::CancellationToken;
use crate::config::AnalysisConfig;
use crate::context::{validate_input, AnalysisContext, RawInput};
use crate::core::{StageName, StageStatus};
use crate::errors::{DealLensError, StageError};
use crate::events::{
    EventSink, NoOpEventSink, ANALYSIS_CANCELLED, ANALYSIS_COMPLETED, ANALYSIS_STARTED,
    STAGE_FAILED, STAGE_SKIPPED, STAGE_STARTED, STAGE_SUCCEEDED,
};
use crate::providers::Providers;
use crate::stages::{
    AnalysisStage, CompetitorProfiler, ExtractionStage, InternalMatcher, ScoringEngine,
    StrategySynthesizer,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Sequences the analysis stages over one [`AnalysisContext`].
pub struct Orchestrator {
    extraction: ExtractionStage,
    matcher: InternalMatcher,
    profiler: CompetitorProfiler,
    scoring: ScoringEngine,
    strategy: StrategySynthesizer,
    config: AnalysisConfig,
    event_sink: Arc<dyn EventSink>,
}

impl Orchestrator {
    /// Wires the stages to `providers` according to `config`.
    ///
    /// The configuration is validated at the start of every run.
    #[must_use]
    pub fn new(providers: Providers, config: AnalysisConfig) -> Self {
        let strategy = if config.strategy_narrative {
            StrategySynthesizer::new().with_narrative(Arc::clone(&providers.completion))
        } else {
            StrategySynthesizer::new()
        };
        Self {
            extraction: ExtractionStage::new(Arc::clone(&providers.completion))
                .with_weight_tolerance(config.weight_tolerance),
            matcher: InternalMatcher::new(Arc::clone(&providers.retrieval), config.top_k),
            profiler: CompetitorProfiler::new(Arc::clone(&providers.competitors)),
            scoring: ScoringEngine::new(),
            strategy,
            config,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sends lifecycle events to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyzes one RFP.
    ///
    /// An empty `competitor_names` falls back to the configured defaults.
    /// `supplementary_info` is merged into the input and shown to extraction.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for an empty document or a blank competitor name,
    /// `Config` for an invalid configuration. Stage failures never error.
    pub async fn run(
        &self,
        raw_input: impl Into<RawInput>,
        competitor_names: &[String],
        supplementary_info: BTreeMap<String, String>,
    ) -> Result<AnalysisContext, DealLensError> {
        self.run_with_cancellation(
            raw_input,
            competitor_names,
            supplementary_info,
            &CancellationToken::new(),
        )
        .await
    }

    /// Like [`run`](Self::run), observing `cancel` between stages.
    ///
    /// Stages not yet dispatched when cancellation is observed are skipped.
    /// A stage already in flight finishes, but its result is discarded and
    /// the stage is recorded as failed.
    #[instrument(skip_all, fields(rfp_id = tracing::field::Empty))]
    pub async fn run_with_cancellation(
        &self,
        raw_input: impl Into<RawInput>,
        competitor_names: &[String],
        supplementary_info: BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisContext, DealLensError> {
        self.config.validate()?;

        let mut raw = raw_input.into();
        raw.supplementary_info.extend(supplementary_info);
        let validated = validate_input(raw, competitor_names, &self.config)?;
        for warning in &validated.warnings {
            warn!(%warning, "input repaired");
        }

        let mut ctx = AnalysisContext::new(validated);
        tracing::Span::current().record("rfp_id", tracing::field::display(ctx.rfp_id()));
        info!(competitors = ctx.competitor_names().len(), "analysis started");
        self.emit(
            ANALYSIS_STARTED,
            json!({
                "rfp_id": ctx.rfp_id(),
                "input_digest": ctx.input_digest(),
                "competitors": ctx.competitor_names(),
                "warnings": ctx.warnings(),
            }),
        );
        let in_flight = self.watch_cancellation(ctx.rfp_id(), cancel);

        if self.proceed(&mut ctx, StageName::Extraction, cancel)? {
            let result = self.dispatch(&self.extraction, &ctx).await;
            self.settle(&mut ctx, StageName::Extraction, result, cancel, |c, out| {
                c.complete_extraction(out)
            })?;
        }

        let run_matcher = self.proceed(&mut ctx, StageName::InternalMatcher, cancel)?;
        let run_profiler = self.proceed(&mut ctx, StageName::CompetitorProfiler, cancel)?;
        let (matches, profiles) = tokio::join!(
            self.dispatch_if(run_matcher, &self.matcher, &ctx),
            self.dispatch_if(run_profiler, &self.profiler, &ctx),
        );
        if let Some(result) = matches {
            self.settle(&mut ctx, StageName::InternalMatcher, result, cancel, |c, out| {
                c.complete_matching(out)
            })?;
        }
        if let Some(result) = profiles {
            self.settle(&mut ctx, StageName::CompetitorProfiler, result, cancel, |c, out| {
                c.complete_profiling(out)
            })?;
        }

        if self.proceed(&mut ctx, StageName::Scoring, cancel)? {
            let result = self.dispatch(&self.scoring, &ctx).await;
            self.settle(&mut ctx, StageName::Scoring, result, cancel, |c, out| {
                c.complete_scoring(out)
            })?;
        }

        if self.proceed(&mut ctx, StageName::Strategy, cancel)? {
            let result = self.dispatch(&self.strategy, &ctx).await;
            self.settle(&mut ctx, StageName::Strategy, result, cancel, |c, out| {
                c.complete_strategy(out)
            })?;
        }

        in_flight.store(false, Ordering::SeqCst);
        ctx.finalize()?;
        let statuses: BTreeMap<&str, String> = ctx
            .stage_status()
            .iter()
            .map(|(stage, record)| (stage.as_str(), record.status.to_string()))
            .collect();
        info!(
            probability = ctx.scoring().map(|s| s.overall_probability),
            "analysis completed"
        );
        self.emit(
            ANALYSIS_COMPLETED,
            json!({
                "rfp_id": ctx.rfp_id(),
                "overall_probability": ctx.scoring().map(|s| s.overall_probability),
                "stages": statuses,
            }),
        );
        Ok(ctx)
    }

    /// Decides whether `stage` is dispatched and marks it running if so.
    ///
    /// A stage already skipped by an upstream failure stays skipped; a
    /// pending stage is skipped once cancellation is observed.
    fn proceed(
        &self,
        ctx: &mut AnalysisContext,
        stage: StageName,
        cancel: &CancellationToken,
    ) -> Result<bool, DealLensError> {
        if ctx.status_of(stage) != StageStatus::Pending {
            return Ok(false);
        }
        if cancel.is_cancelled() {
            let reason = format!("cancelled: {}", cancel.reason().unwrap_or_default());
            self.skip(ctx, stage, reason)?;
            return Ok(false);
        }
        ctx.mark_running(stage)?;
        debug!(%stage, "stage dispatched");
        self.emit(
            STAGE_STARTED,
            json!({"rfp_id": ctx.rfp_id(), "stage": stage.as_str()}),
        );
        Ok(true)
    }

    async fn dispatch<S: AnalysisStage>(
        &self,
        stage: &S,
        ctx: &AnalysisContext,
    ) -> Result<S::Output, StageError> {
        within_budget(self.config.timeout_for(stage.name()), stage.execute(ctx)).await
    }

    async fn dispatch_if<S: AnalysisStage>(
        &self,
        dispatched: bool,
        stage: &S,
        ctx: &AnalysisContext,
    ) -> Option<Result<S::Output, StageError>> {
        if dispatched {
            Some(self.dispatch(stage, ctx).await)
        } else {
            None
        }
    }

    /// Applies a finished stage's result. Failures skip its hard dependents.
    fn settle<T, F>(
        &self,
        ctx: &mut AnalysisContext,
        stage: StageName,
        result: Result<T, StageError>,
        cancel: &CancellationToken,
        apply: F,
    ) -> Result<(), DealLensError>
    where
        F: FnOnce(&mut AnalysisContext, T) -> Result<(), DealLensError>,
    {
        let result = match result {
            Ok(_) if cancel.is_cancelled() => Err(StageError::Cancelled),
            other => other,
        };

        match result {
            Ok(output) => {
                apply(ctx, output)?;
                let duration_ms = ctx.stage(stage).duration_ms;
                info!(%stage, duration_ms, "stage succeeded");
                self.emit(
                    STAGE_SUCCEEDED,
                    json!({
                        "rfp_id": ctx.rfp_id(),
                        "stage": stage.as_str(),
                        "duration_ms": duration_ms,
                    }),
                );
            }
            Err(error) => {
                ctx.mark_failed(stage, &error)?;
                warn!(%stage, kind = error.kind(), %error, "stage failed");
                self.emit(
                    STAGE_FAILED,
                    json!({
                        "rfp_id": ctx.rfp_id(),
                        "stage": stage.as_str(),
                        "error_kind": error.kind(),
                        "reason": error.to_string(),
                    }),
                );
                for dependent in stage.hard_dependents() {
                    if ctx.status_of(*dependent) == StageStatus::Pending {
                        self.skip(ctx, *dependent, format!("upstream '{stage}' failed"))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn skip(
        &self,
        ctx: &mut AnalysisContext,
        stage: StageName,
        reason: String,
    ) -> Result<(), DealLensError> {
        debug!(%stage, %reason, "stage skipped");
        self.emit(
            STAGE_SKIPPED,
            json!({"rfp_id": ctx.rfp_id(), "stage": stage.as_str(), "reason": reason}),
        );
        ctx.mark_skipped(stage, reason)?;
        Ok(())
    }

    /// Emits `analysis.cancelled` when `cancel` fires while the run is in
    /// flight. The returned flag closes the window at the end of the run.
    fn watch_cancellation(&self, rfp_id: Uuid, cancel: &CancellationToken) -> Arc<AtomicBool> {
        let in_flight = Arc::new(AtomicBool::new(true));
        let open = Arc::clone(&in_flight);
        let sink = Arc::clone(&self.event_sink);
        cancel.on_cancel(move |reason| {
            if open.load(Ordering::SeqCst) {
                info!(%rfp_id, %reason, "analysis cancelled");
                sink.try_emit(
                    ANALYSIS_CANCELLED,
                    Some(json!({"rfp_id": rfp_id, "reason": reason})),
                );
            }
        });
        in_flight
    }

    fn emit(&self, event_type: &str, data: Value) {
        self.event_sink.try_emit(event_type, Some(data));
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use crate::testing::{
        sample_providers, worked_example_providers, FailingCompletion, SAMPLE_RFP,
    };
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_full_run_succeeds_and_emits_events() {
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = Orchestrator::new(sample_providers(), AnalysisConfig::default())
            .with_event_sink(sink.clone());

        let ctx = orchestrator
            .run(SAMPLE_RFP, &names(&["Acme Analytics", "Globex Consulting"]), BTreeMap::new())
            .await
            .unwrap();

        assert!(ctx.is_finalized());
        for stage in StageName::ALL {
            assert_eq!(ctx.status_of(stage), StageStatus::Succeeded, "{stage}");
        }
        assert_eq!(sink.names().first().map(String::as_str), Some(ANALYSIS_STARTED));
        assert_eq!(sink.names().last().map(String::as_str), Some(ANALYSIS_COMPLETED));
        assert_eq!(sink.stages_for(STAGE_SUCCEEDED).len(), 5);
        assert_eq!(sink.stages_for(STAGE_STARTED)[0], "extraction");
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_everything_downstream() {
        let mut providers = worked_example_providers();
        providers.completion = Arc::new(FailingCompletion::unavailable());
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator =
            Orchestrator::new(providers, AnalysisConfig::default()).with_event_sink(sink.clone());

        let ctx = orchestrator
            .run(SAMPLE_RFP, &names(&["Globex"]), BTreeMap::new())
            .await
            .unwrap();

        let extraction = ctx.stage(StageName::Extraction);
        assert_eq!(extraction.status, StageStatus::Failed);
        assert_eq!(extraction.error_kind.as_deref(), Some("ProviderError"));
        for stage in extraction_dependents() {
            assert_eq!(ctx.status_of(stage), StageStatus::Skipped, "{stage}");
        }
        assert!(ctx.requirements().is_empty());
        assert_eq!(sink.stages_for(STAGE_SKIPPED).len(), 4);
    }

    fn extraction_dependents() -> Vec<StageName> {
        StageName::Extraction.hard_dependents().to_vec()
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_all_stages() {
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = Orchestrator::new(sample_providers(), AnalysisConfig::default())
            .with_event_sink(sink.clone());
        let cancel = CancellationToken::new();
        cancel.cancel("caller gave up");

        let ctx = orchestrator
            .run_with_cancellation(SAMPLE_RFP, &[], BTreeMap::new(), &cancel)
            .await
            .unwrap();

        let cancelled = sink.events_of_type(ANALYSIS_CANCELLED);
        assert_eq!(cancelled.len(), 1);
        let payload = cancelled[0].1.as_ref().unwrap();
        assert_eq!(payload["reason"], "caller gave up");
        assert_eq!(sink.names()[1], ANALYSIS_CANCELLED);

        for stage in StageName::ALL {
            let record = ctx.stage(stage);
            assert_eq!(record.status, StageStatus::Skipped);
            assert_eq!(record.reason.as_deref(), Some("cancelled: caller gave up"));
        }
    }

    #[tokio::test]
    async fn test_cancel_after_the_run_emits_nothing() {
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = Orchestrator::new(sample_providers(), AnalysisConfig::default())
            .with_event_sink(sink.clone());
        let cancel = CancellationToken::new();

        orchestrator
            .run_with_cancellation(SAMPLE_RFP, &names(&["Acme Analytics"]), BTreeMap::new(), &cancel)
            .await
            .unwrap();
        let before = sink.len();
        cancel.cancel("too late");

        assert_eq!(sink.len(), before);
        assert!(sink.events_of_type(ANALYSIS_CANCELLED).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = AnalysisConfig::default();
        config.top_k = 0;
        let err = Orchestrator::new(sample_providers(), config)
            .run(SAMPLE_RFP, &[], BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DealLensError::Config(_)));
    }
}
