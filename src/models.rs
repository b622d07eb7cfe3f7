// models.rs - Account and transfer record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{Amount, Balance, Owner, TransferId};

// ============================================================
// ACCOUNT
// ============================================================

/// Account record, keyed by `owner`.
///
/// The balance is a signed whole number. The transfer core never checks for
/// overdraft; that is a policy for the account-management layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub owner: Owner,
    pub balance: Balance,
}

impl Account {
    pub fn new(owner: impl Into<Owner>, balance: Balance) -> Self {
        Self {
            owner: owner.into(),
            balance,
        }
    }
}

// ============================================================
// TRANSFER RECORD (append-only ledger entry)
// ============================================================

/// Ledger entry waiting to be inserted. The backend assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub from: Owner,
    pub to: Owner,
    pub amount: Amount,
}

/// Committed ledger entry. Never updated or deleted by the transfer path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub from: Owner,
    pub to: Owner,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Materialize a pending entry with a freshly minted id
    pub fn from_new(new: &NewTransfer) -> Self {
        Self {
            id: TransferId::new(),
            from: new.from.clone(),
            to: new.to.clone(),
            amount: new.amount.get(),
            created_at: Utc::now(),
        }
    }

    /// Whether `owner` is the sender or the receiver
    pub fn involves(&self, owner: &str) -> bool {
        self.from == owner || self.to == owner
    }
}
