//! Write-once field storage.

use crate::errors::FieldConflictError;
use serde::{Deserialize, Serialize};

/// A field that can be written at most once.
///
/// Writing to an already populated slot raises a `FieldConflictError`.
/// Serializes as the inner value or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriteOnce<T>(Option<T>);

impl<T> Default for WriteOnce<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> WriteOnce<T> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`.
    ///
    /// # Errors
    ///
    /// Returns `FieldConflictError` naming `field` if the slot is populated.
    pub fn set(&mut self, field: &str, value: T) -> Result<(), FieldConflictError> {
        if self.0.is_some() {
            return Err(FieldConflictError::new(field));
        }
        self.0 = Some(value);
        Ok(())
    }

    /// Returns the value if written.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    /// Returns true if the slot was written.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}
