//! Transfer Error Types
//!
//! Every failure the transfer core surfaces, with a stable code for API
//! responses and the HTTP status the gateway maps it to.

use thiserror::Error;

use super::classifier::{ConflictClassifier, FailureClass};
use crate::persistence::BackendError;

/// Transfer error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors ===
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // === Concurrency Errors ===
    /// Transient. The whole transaction may succeed if run again.
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Transfer gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<TransferError>,
    },

    #[error("Time limit exceeded: {0}")]
    Timeout(String),

    // === Persistence Errors ===
    #[error("Ledger insert was not acknowledged")]
    InsertFailure,

    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    // === System Errors ===
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Fatal backend error: {0}")]
    Fatal(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::InvalidAmount(_) => "INVALID_AMOUNT",
            TransferError::WriteConflict(_) => "WRITE_CONFLICT",
            TransferError::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
            TransferError::Timeout(_) => "TIMEOUT",
            TransferError::InsertFailure => "INSERT_FAILURE",
            TransferError::DuplicateAccount(_) => "DUPLICATE_ACCOUNT",
            TransferError::InvalidStateTransition(_) => "INVALID_STATE_TRANSITION",
            TransferError::Fatal(_) => "FATAL",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::AccountNotFound(_) => 404,
            TransferError::InvalidAmount(_) => 400,
            TransferError::WriteConflict(_)
            | TransferError::RetriesExhausted { .. }
            | TransferError::DuplicateAccount(_) => 409,
            TransferError::Timeout(_) => 504,
            TransferError::InsertFailure
            | TransferError::InvalidStateTransition(_)
            | TransferError::Fatal(_) => 500,
        }
    }

    /// Only write conflicts are worth running the transaction again
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::WriteConflict(_))
    }

    /// Whether a conflict is the cause, directly or after retries
    pub fn is_write_conflict(&self) -> bool {
        match self {
            TransferError::WriteConflict(_) => true,
            TransferError::RetriesExhausted { last, .. } => last.is_write_conflict(),
            _ => false,
        }
    }
}

impl From<BackendError> for TransferError {
    fn from(e: BackendError) -> Self {
        match ConflictClassifier::classify(&e) {
            FailureClass::WriteConflict => TransferError::WriteConflict(e.to_string()),
            FailureClass::Timeout => TransferError::Timeout(e.to_string()),
            FailureClass::Fatal => TransferError::Fatal(e.to_string()),
        }
    }
}
