//! Test support for deallens.
//!
//! In-memory implementations of the three capability traits plus a few
//! ready-made documents. Used by the crate's own tests and available to
//! downstream crates that want to exercise the orchestrator without a
//! language model or vector store.

mod fixtures;
mod mocks;

pub use fixtures::{
    sample_directory, sample_providers, sample_retrieval,
    worked_example_extraction, worked_example_providers, SAMPLE_COMPLETION_TEXT, SAMPLE_RFP,
};
pub use mocks::{
    FailingCompletion, InMemoryCompetitorDirectory, InMemoryRetrieval, SlowCompletion,
    StaticCompletion,
};
