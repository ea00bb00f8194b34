//! Infrastructure and service error types.

use thiserror::Error;

use carebill_core::{ClientId, DomainError, InvoiceId};

/// Persistence operation error.
///
/// These are **infrastructure errors** (storage, concurrency, serialization)
/// as opposed to domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write (e.g. a duplicate invoice number).
    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("stored data could not be (de)serialized: {0}")]
    Serialization(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Error returned by the billing services.
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("no sender found for client {0}")]
    NoSender(ClientId),

    #[error("no contracts found for client {0}")]
    NoContracts(ClientId),

    #[error("no billable items found for client {0} in the specified date range")]
    NoBillableItems(ClientId),

    #[error("invoice {0} not found")]
    InvoiceNotFound(InvoiceId),
}

pub type BillingResult<T> = Result<T, BillingError>;
