//! Core execution model for deallens.
//!
//! This module contains the fundamental types used by the orchestrator:
//! - Stage names and the per-stage status state machine
//! - The stage record kept in the analysis context

mod record;
mod status;

pub use record::StageRecord;
pub use status::{StageName, StageStatus};
