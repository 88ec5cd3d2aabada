//! Configuration for an analysis run.
//!
//! Every field has a serde default so a partial (or empty) TOML document
//! yields a usable configuration.

use crate::core::StageName;
use crate::errors::DealLensError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for the orchestrator and its stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Default per-stage timeout in milliseconds.
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,
    /// Per-stage overrides.
    #[serde(default)]
    pub timeouts: StageTimeouts,
    /// Maximum number of internal matches kept.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Maximum number of competitors profiled; extra names are dropped.
    #[serde(default = "default_max_competitors")]
    pub max_competitors: usize,
    /// Competitors profiled when the caller supplies none.
    #[serde(default)]
    pub default_competitors: Vec<String>,
    /// RFP texts shorter than this produce a warning.
    #[serde(default = "default_min_input_chars")]
    pub min_input_chars: usize,
    /// Allowed deviation of the criteria weight sum from 1.0.
    #[serde(default = "default_weight_tolerance")]
    pub weight_tolerance: f64,
    /// Ask the completion provider for a short narrative with the strategy.
    #[serde(default)]
    pub strategy_narrative: bool,
}

fn default_stage_timeout_ms() -> u64 {
    60_000
}

fn default_top_k() -> usize {
    10
}

fn default_max_competitors() -> usize {
    10
}

fn default_min_input_chars() -> usize {
    100
}

fn default_weight_tolerance() -> f64 {
    1e-6
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stage_timeout_ms: default_stage_timeout_ms(),
            timeouts: StageTimeouts::default(),
            top_k: default_top_k(),
            max_competitors: default_max_competitors(),
            default_competitors: Vec::new(),
            min_input_chars: default_min_input_chars(),
            weight_tolerance: default_weight_tolerance(),
            strategy_narrative: false,
        }
    }
}

/// Optional per-stage timeout overrides in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageTimeouts {
    /// Extraction stage.
    #[serde(default)]
    pub extraction_ms: Option<u64>,
    /// Internal matcher.
    #[serde(default)]
    pub internal_matcher_ms: Option<u64>,
    /// Competitor profiler.
    #[serde(default)]
    pub competitor_profiler_ms: Option<u64>,
    /// Scoring engine.
    #[serde(default)]
    pub scoring_ms: Option<u64>,
    /// Strategy synthesizer.
    #[serde(default)]
    pub strategy_ms: Option<u64>,
}

impl AnalysisConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, DealLensError> {
        let config: Self =
            toml::from_str(source).map_err(|e| DealLensError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DealLensError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml(&source)
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<(), DealLensError> {
        if self.top_k == 0 {
            return Err(DealLensError::Config("top_k must be at least 1".to_string()));
        }
        if self.max_competitors == 0 {
            return Err(DealLensError::Config(
                "max_competitors must be at least 1".to_string(),
            ));
        }
        if self.stage_timeout_ms == 0 {
            return Err(DealLensError::Config(
                "stage_timeout_ms must be positive".to_string(),
            ));
        }
        if StageName::ALL
            .iter()
            .any(|stage| self.timeouts.get(*stage) == Some(0))
        {
            return Err(DealLensError::Config(
                "stage timeout overrides must be positive".to_string(),
            ));
        }
        if !(self.weight_tolerance.is_finite() && self.weight_tolerance >= 0.0) {
            return Err(DealLensError::Config(
                "weight_tolerance must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the default stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout_ms = duration_ms(timeout);
        self
    }

    /// Overrides the timeout of one stage.
    #[must_use]
    pub fn with_timeout_for(mut self, stage: StageName, timeout: Duration) -> Self {
        let ms = Some(duration_ms(timeout));
        match stage {
            StageName::Extraction => self.timeouts.extraction_ms = ms,
            StageName::InternalMatcher => self.timeouts.internal_matcher_ms = ms,
            StageName::CompetitorProfiler => self.timeouts.competitor_profiler_ms = ms,
            StageName::Scoring => self.timeouts.scoring_ms = ms,
            StageName::Strategy => self.timeouts.strategy_ms = ms,
        }
        self
    }

    /// Sets the match cap.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Sets the fallback competitor list.
    #[must_use]
    pub fn with_default_competitors(
        mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.default_competitors = names.into_iter().map(Into::into).collect();
        self
    }

    /// Enables the strategy narrative.
    #[must_use]
    pub fn with_strategy_narrative(mut self, enabled: bool) -> Self {
        self.strategy_narrative = enabled;
        self
    }

    /// Effective timeout for a stage.
    #[must_use]
    pub fn timeout_for(&self, stage: StageName) -> Duration {
        Duration::from_millis(self.timeouts.get(stage).unwrap_or(self.stage_timeout_ms))
    }
}

impl StageTimeouts {
    /// Returns the override for a stage.
    #[must_use]
    pub fn get(&self, stage: StageName) -> Option<u64> {
        match stage {
            StageName::Extraction => self.extraction_ms,
            StageName::InternalMatcher => self.internal_matcher_ms,
            StageName::CompetitorProfiler => self.competitor_profiler_ms,
            StageName::Scoring => self.scoring_ms,
            StageName::Strategy => self.strategy_ms,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
