//! Shared primitives for all Rust crates in Gantry.

#![forbid(unsafe_code)]

/// Identifier newtypes shared across layers.
pub mod ids;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use ids::{ArtifactId, RepoId, RunId};

/// Result type used across Gantry crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Query, transaction or commit failure in the metadata store.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Delete or list failure in the backing object store.
    #[error("object store error: {0}")]
    ObjectStore(String),

    /// Caller-supplied deadline elapsed before the operation finished.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns true when the error reports an absent resource.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
