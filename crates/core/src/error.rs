//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business failures raised by pure
/// decision logic before anything touches the event store. Storage and
/// concurrency failures belong to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Required command input is missing or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced aggregate does not exist or is already removed.
    #[error("not found: {0}")]
    NotFound(String),

    /// A state-machine guard rejected the command, or the command would change nothing.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// An identifier was invalid (e.g. blank).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
