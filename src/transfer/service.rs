//! Transfer entry point used by the gateway

use std::sync::Arc;

use tracing::debug;

use super::coordinator::TransferCoordinator;
use super::error::TransferError;
use super::retry::RetryPolicy;
use super::types::TransferRequest;
use crate::core_types::TransferId;
use crate::persistence::{Backend, TxOptions};

/// Validates a transfer, then runs it with bounded retry.
///
/// Every attempt gets a fresh coordinator, and with it a fresh session and
/// transaction context.
pub struct TransferService<B: Backend> {
    backend: Arc<B>,
    retry: RetryPolicy,
    options: TxOptions,
}

impl<B: Backend> Clone for TransferService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            retry: self.retry.clone(),
            options: self.options,
        }
    }
}

impl<B: Backend> TransferService<B> {
    pub fn new(backend: Arc<B>, retry: RetryPolicy, options: TxOptions) -> Self {
        Self {
            backend,
            retry,
            options,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn options(&self) -> &TxOptions {
        &self.options
    }

    /// Move `amount` from `from` to `to`, returning the ledger entry id
    pub async fn create_transfer(
        &self,
        from: &str,
        to: &str,
        amount: i64,
    ) -> Result<TransferId, TransferError> {
        // rejected before any session is opened
        let req = &TransferRequest::new(from, to, amount)?;
        let backend = self.backend.as_ref();
        let options = self.options;

        self.retry
            .run(move |attempt| async move {
                debug!(attempt, from = %req.from, to = %req.to, "Transfer attempt");
                TransferCoordinator::new(backend, options).execute(req).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Account;
    use crate::persistence::MemoryBackend;
    use crate::transfer::RetryConfig;
    use std::time::Duration;

    fn service(backend: Arc<MemoryBackend>) -> TransferService<MemoryBackend> {
        let retry = RetryPolicy::new(RetryConfig {
            max_retries: 3,
            backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            jitter: false,
        })
        .unwrap();
        TransferService::new(backend, retry, TxOptions::default())
    }

    #[tokio::test]
    async fn test_invalid_amount_opens_no_session() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert_account(&Account::new("test1", 1000)).await.unwrap();
        let svc = service(Arc::clone(&backend));

        for amount in [0, -5] {
            let err = svc.create_transfer("test1", "test2", amount).await.unwrap_err();
            assert!(matches!(err, TransferError::InvalidAmount(_)));
        }
        assert_eq!(backend.count_transfers().await.unwrap(), 0);
        assert_eq!(backend.find_account("test1").await.unwrap().unwrap().balance, 1000);
    }

    #[tokio::test]
    async fn test_create_transfer() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert_account(&Account::new("test1", 1000)).await.unwrap();
        backend.insert_account(&Account::new("test2", 1000)).await.unwrap();
        let svc = service(Arc::clone(&backend));

        let id = svc.create_transfer("test1", "test2", 250).await.unwrap();
        let records = backend.find_transfers("test2").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(backend.find_account("test1").await.unwrap().unwrap().balance, 750);
    }
}
