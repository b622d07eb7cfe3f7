//! Ledger - Transfer audit log
//!
//! Append-only record of every committed transfer. Entries are written
//! inside the same transaction context as the balance changes they describe.

use tracing::debug;

use crate::core_types::{Amount, TransferId};
use crate::models::{NewTransfer, TransferRecord};
use crate::persistence::{Backend, TxContext};
use crate::transfer::TransferError;

pub struct TransferLedger;

impl TransferLedger {
    /// Record a transfer inside the caller's context.
    ///
    /// The amount is validated before the context is touched, so a rejected
    /// amount never establishes the snapshot.
    pub async fn append<T: TxContext>(
        tx: &mut T,
        from: &str,
        to: &str,
        amount: i64,
    ) -> Result<TransferId, TransferError> {
        let amount = Amount::new(amount)?;
        let entry = NewTransfer {
            from: from.to_string(),
            to: to.to_string(),
            amount,
        };

        match tx.insert_transfer(&entry).await? {
            Some(record) => {
                debug!(transfer_id = %record.id, from, to, amount = amount.get(), "Ledger entry written");
                Ok(record.id)
            }
            None => Err(TransferError::InsertFailure),
        }
    }

    /// Committed transfers sent or received by `owner`, oldest first
    pub async fn for_owner<B: Backend>(
        backend: &B,
        owner: &str,
    ) -> Result<Vec<TransferRecord>, TransferError> {
        Ok(backend.find_transfers(owner).await?)
    }

    /// Number of committed transfers
    pub async fn len<B: Backend>(backend: &B) -> Result<u64, TransferError> {
        Ok(backend.count_transfers().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryBackend, Session, TxOptions, WriteConcern};

    #[tokio::test]
    async fn test_append_visible_after_commit() {
        let backend = MemoryBackend::new();
        let mut session = backend.start_session().await.unwrap();
        let mut tx = session.start_transaction(&TxOptions::default()).await.unwrap();

        let id = TransferLedger::append(&mut tx, "alice", "bob", 25).await.unwrap();
        assert_eq!(TransferLedger::len(&backend).await.unwrap(), 0);

        tx.commit().await.unwrap();
        let records = TransferLedger::for_owner(&backend, "bob").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].amount, 25);
        assert!(TransferLedger::for_owner(&backend, "carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_amount_does_not_touch_context() {
        let backend = MemoryBackend::new();
        let mut session = backend.start_session().await.unwrap();
        let mut tx = session.start_transaction(&TxOptions::default()).await.unwrap();

        for amount in [0, -5] {
            let err = TransferLedger::append(&mut tx, "alice", "bob", amount)
                .await
                .unwrap_err();
            assert!(matches!(err, TransferError::InvalidAmount(_)));
        }
        assert!(!tx.snapshot_established());
        tx.abort().await.unwrap();
    }

    #[tokio::test]
    async fn test_unacknowledged_insert_fails() {
        let backend = MemoryBackend::new();
        let mut session = backend.start_session().await.unwrap();
        let opts = TxOptions::default().with_write_concern(WriteConcern::Unacknowledged);
        let mut tx = session.start_transaction(&opts).await.unwrap();

        let err = TransferLedger::append(&mut tx, "alice", "bob", 1).await.unwrap_err();
        assert_eq!(err, TransferError::InsertFailure);
        tx.abort().await.unwrap();
    }
}
