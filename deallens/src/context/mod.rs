//! Analysis context and run input.
//!
//! This module provides:
//! - `RawInput` and boundary validation of a run request
//! - `AnalysisContext`, the write-once aggregate the stages fill in
//! - `AnalysisSummary`, a compact projection for reports

mod analysis;
mod input;
mod slot;
mod summary;

pub use analysis::{AnalysisContext, ExtractionOutput};
pub use input::{validate_input, RawInput, ValidatedInput};
pub use slot::WriteOnce;
pub use summary::AnalysisSummary;
