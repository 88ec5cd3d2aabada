//! Run orchestration.
//!
//! This module provides:
//! - The [`Orchestrator`] that sequences the analysis stages
//! - Per-stage time budgets

mod orchestrator;
mod timeout;

pub use orchestrator::Orchestrator;
pub use timeout::{run_with_timeout, within_budget, TimedResult};
