//! Backend failure classification
//!
//! Drivers report failures as code + message + labels. The transfer core only
//! needs to know whether running the transaction again can help.

use crate::persistence::postgres::sqlstate;
use crate::persistence::{BackendError, TRANSIENT_TRANSACTION_ERROR, codes};

/// What a backend failure means for the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Concurrent modification. Retryable.
    WriteConflict,
    /// Time budget exceeded. Not retried.
    Timeout,
    /// Anything else. Not retried.
    Fatal,
}

pub struct ConflictClassifier;

impl ConflictClassifier {
    pub fn classify(err: &BackendError) -> FailureClass {
        if err.has_label(TRANSIENT_TRANSACTION_ERROR) {
            return FailureClass::WriteConflict;
        }
        match err.code() {
            Some(
                codes::WRITE_CONFLICT
                | sqlstate::SERIALIZATION_FAILURE
                | sqlstate::DEADLOCK_DETECTED,
            ) => FailureClass::WriteConflict,
            Some(
                codes::MAX_TIME_EXPIRED | sqlstate::QUERY_CANCELED | sqlstate::LOCK_NOT_AVAILABLE,
            ) => FailureClass::Timeout,
            _ => FailureClass::Fatal,
        }
    }
}
