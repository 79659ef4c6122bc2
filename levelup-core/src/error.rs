//! Typed engine errors.
//!
//! Every variant is recoverable: the operation is rejected and the session
//! is left exactly as it was.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Bad user or advisor input (empty title, non-positive XP).
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("no {kind} with id {id}")]
    NotFound { kind: &'static str, id: String },

    /// The task exists but the transition is not allowed from its state.
    #[error("invalid state for task {id}: {reason}")]
    InvalidState { id: String, reason: String },

    #[error("only one deletion per day; already deleted a quest on {day}")]
    RateLimited { day: NaiveDate },

    #[error("persistence error for {key}: {message}")]
    Persistence { key: String, message: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub(crate) fn task_not_found(id: &str) -> Self {
        EngineError::NotFound {
            kind: "task",
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_state(id: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidState {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}
