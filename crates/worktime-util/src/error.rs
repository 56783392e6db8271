//! Error types for the work-time engine

use thiserror::Error;

use crate::EntityId;

/// Failure to parse a time or date primitive
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid time '{value}': {reason}")]
    InvalidTime { value: String, reason: String },

    #[error("Invalid date '{value}'")]
    InvalidDate { value: String },
}

/// Top-level error type for work-time operations
#[derive(Debug, Error)]
pub enum WorkTimeError {
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("Start and end date/time are required")]
    IncompleteWindow,

    #[error("End time must be after start time")]
    InvertedWindow,

    #[error("End time must be in the future")]
    WindowNotInFuture,

    /// Stored exception dates that can't be parsed. Logged where the
    /// exception is ingested and recovered from its stored `active` flag;
    /// never returned by the evaluator.
    #[error("Malformed exception data: {0}")]
    MalformedExceptionData(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkTimeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }
}

impl From<ParseError> for WorkTimeError {
    fn from(e: ParseError) -> Self {
        Self::ValidationError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkTimeError>;
