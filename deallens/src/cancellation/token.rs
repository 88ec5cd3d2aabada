//! Cancellation token for an analysis run.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

type Callback = Box<dyn FnOnce(&str) + Send>;

#[derive(Default)]
struct TokenState {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
    callbacks: Mutex<Vec<Callback>>,
}

/// Cooperative cancellation handle.
///
/// Clones share state, so one clone can be handed to the orchestrator while
/// another stays with the caller. Cancellation stops further stages from
/// being scheduled; a stage already in flight runs to completion but its
/// result is discarded. The first reason wins.
#[derive(Clone, Default)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Creates an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Later calls are ignored.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self
            .state
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let reason = reason.into();
        let callbacks = {
            let mut pending = self.state.callbacks.lock();
            *self.state.reason.lock() = Some(reason.clone());
            std::mem::take(&mut *pending)
        };
        for callback in callbacks {
            run_callback(callback, &reason);
        }
    }

    /// Registers a callback receiving the cancellation reason.
    ///
    /// Runs immediately if the token is already cancelled.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce(&str) + Send + 'static,
    {
        let mut callbacks = self.state.callbacks.lock();
        if let Some(reason) = self.reason() {
            drop(callbacks);
            run_callback(Box::new(callback), &reason);
        } else {
            callbacks.push(Box::new(callback));
        }
    }

    /// Returns true once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// The reason passed to the first `cancel` call.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.state.reason.lock().clone()
    }
}

fn run_callback(callback: Callback, reason: &str) {
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(reason))).is_err() {
        warn!("cancellation callback panicked");
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
