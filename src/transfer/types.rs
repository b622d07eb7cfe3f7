//! Transfer request types

use crate::core_types::{Amount, Owner};

use super::error::TransferError;

/// A validated transfer: the amount is known to be positive before any
/// backend work starts. `from == to` is allowed and nets to zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from: Owner,
    pub to: Owner,
    pub amount: Amount,
}

impl TransferRequest {
    pub fn new(
        from: impl Into<Owner>,
        to: impl Into<Owner>,
        amount: i64,
    ) -> Result<Self, TransferError> {
        Ok(Self {
            from: from.into(),
            to: to.into(),
            amount: Amount::new(amount)?,
        })
    }
}
