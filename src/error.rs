//! Error types shared by the timer core and its collaborators

use std::time::Duration;

use thiserror::Error;

/// Failure reported by a collaborator (settings or task persistence)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors surfaced to callers of the timer core
///
/// Commands against a user without an active timer are not errors; they
/// report `false`/`None` instead and leave everything untouched.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TimerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Part of the taxonomy only: the core logs collaborator failures and
    /// degrades instead of returning them
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(#[from] StoreError),
}

impl TimerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
