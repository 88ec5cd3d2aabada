//! Cooperative cancellation of analysis runs.

mod token;

pub use token::CancellationToken;
