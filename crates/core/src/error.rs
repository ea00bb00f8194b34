//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Persistence concerns belong to the store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (bad date range, unsupported unit, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated (e.g. declared total != sum of lines).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (non-positive or unparsable).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// The operation conflicts with the current state of the resource.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// The human-readable message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(msg)
            | Self::InvariantViolation(msg)
            | Self::InvalidId(msg)
            | Self::Conflict(msg) => msg,
            Self::NotFound => "not found",
        }
    }
}
