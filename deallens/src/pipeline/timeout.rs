//! Per-stage time budgets.

use crate::errors::StageError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Result of a timed operation.
#[derive(Debug)]
pub enum TimedResult<T, E> {
    /// Operation completed successfully.
    Ok(T),
    /// Operation failed with an error.
    Err(E),
    /// Operation timed out.
    Timeout,
}

impl<T, E> TimedResult<T, E> {
    /// Returns true if the operation timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimedResult::Timeout)
    }

    /// Converts to a standard Result, treating timeout as an error.
    pub fn into_result(self, timeout_error: E) -> Result<T, E> {
        match self {
            TimedResult::Ok(v) => Ok(v),
            TimedResult::Err(e) => Err(e),
            TimedResult::Timeout => Err(timeout_error),
        }
    }
}

/// Runs a future with a timeout.
pub async fn run_with_timeout<T, E, F>(duration: Duration, future: F) -> TimedResult<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, future).await {
        Ok(Ok(value)) => TimedResult::Ok(value),
        Ok(Err(error)) => TimedResult::Err(error),
        Err(_) => TimedResult::Timeout,
    }
}

/// Runs a stage future within its budget; running out maps to [`StageError::Timeout`].
pub async fn within_budget<T, F>(budget: Duration, future: F) -> Result<T, StageError>
where
    F: Future<Output = Result<T, StageError>>,
{
    run_with_timeout(budget, future)
        .await
        .into_result(StageError::Timeout)
}
