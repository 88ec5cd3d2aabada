//! Error types for the deallens analysis engine.
//!
//! Two layers exist. [`DealLensError`] is what `Orchestrator::run` can return to
//! its caller: boundary contract violations, configuration problems and internal
//! invariant breaches. [`StageError`] is what an individual stage produces; the
//! orchestrator always catches it and records it in the stage status map.

use crate::core::{StageName, StageStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The main error type for deallens operations.
#[derive(Debug, Error)]
pub enum DealLensError {
    /// The top-level run input violated its contract.
    #[error("{0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stage tried to write a field that was already written.
    #[error("{0}")]
    FieldConflict(#[from] FieldConflictError),

    /// A stage status transition broke the state machine.
    #[error("{0}")]
    InvalidTransition(#[from] InvalidTransitionError),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "INPUT-001-EMPTY_RFP").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when the input handed to a run is unusable.
#[derive(Debug, Clone, Error)]
#[error("Invalid input: {message}")]
pub struct InvalidInputError {
    /// The error message.
    pub message: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl InvalidInputError {
    /// The RFP text was empty or whitespace-only.
    #[must_use]
    pub fn empty_rfp() -> Self {
        Self {
            message: "RFP text is empty".to_string(),
            error_info: ContractErrorInfo::new("INPUT-001-EMPTY_RFP", "RFP text is empty")
                .with_fix_hint("Pass the extracted document text, not an empty string."),
        }
    }

    /// A competitor entry was blank.
    #[must_use]
    pub fn blank_competitor(position: usize) -> Self {
        Self {
            message: format!("competitor name at position {position} is blank"),
            error_info: ContractErrorInfo::new(
                "INPUT-002-BLANK_COMPETITOR",
                "Competitor list contains a blank name",
            )
            .with_fix_hint("Remove empty entries from the competitor list.")
            .with_context_entry("position", position.to_string()),
        }
    }
}

/// Error raised when a write-once context field is written twice.
#[derive(Debug, Clone, Error)]
#[error("Field conflict: '{field}' was already written")]
pub struct FieldConflictError {
    /// The conflicting field.
    pub field: String,
}

impl FieldConflictError {
    /// Creates a new field conflict error.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }
}

/// Error raised when a stage status moves against the state machine.
#[derive(Debug, Clone, Error)]
#[error("Invalid transition for stage '{stage}': {from} -> {to}")]
pub struct InvalidTransitionError {
    /// The stage whose status was changed.
    pub stage: StageName,
    /// The current status.
    pub from: StageStatus,
    /// The requested status.
    pub to: StageStatus,
}

/// Classifies a capability failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The provider did not answer in time.
    Timeout,
    /// The provider refused because of rate limiting.
    RateLimited,
    /// The provider answered with something that could not be parsed.
    MalformedResponse,
    /// The provider could not be reached.
    Unavailable,
    /// The requested entity does not exist.
    NotFound,
    /// Anything else.
    Other,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::MalformedResponse => write!(f, "malformed_response"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::NotFound => write!(f, "not_found"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Failure reported by an external capability (completion, retrieval, lookup).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Provider error ({kind}): {message}")]
pub struct ProviderError {
    /// The failure class.
    pub kind: ProviderErrorKind,
    /// Human readable detail.
    pub message: String,
}

impl ProviderError {
    /// Creates a provider error.
    #[must_use]
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message)
    }

    /// Creates a malformed response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::MalformedResponse, message)
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotFound, message)
    }
}

/// Errors a single analysis stage can produce.
///
/// None of these escape `Orchestrator::run`; they end up in the stage status map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// The RFP did not yield a usable requirement/evaluation model.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// The retrieval capability was unavailable.
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// The competitor list could not be profiled.
    #[error("Profiling failed: {0}")]
    Profiling(String),

    /// There was nothing to score against.
    #[error("Scoring failed: {0}")]
    Scoring(String),

    /// Strategy could not be derived.
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// A provider call failed.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// The stage exceeded its time budget.
    #[error("timeout")]
    Timeout,

    /// The run was cancelled before the result could be applied.
    #[error("cancelled")]
    Cancelled,
}

impl StageError {
    /// Returns a stable tag for the error class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Extraction(_) => "ExtractionError",
            Self::Retrieval(_) => "RetrievalError",
            Self::Profiling(_) => "ProfilingError",
            Self::Scoring(_) => "ScoringError",
            Self::Synthesis(_) => "SynthesisError",
            Self::Provider(_) => "ProviderError",
            Self::Timeout => "TimeoutError",
            Self::Cancelled => "Cancelled",
        }
    }
}
