//! Repository layer for account records

use tracing::{debug, info};

use crate::models::Account;
use crate::persistence::{Backend, OpOptions, TxContext};
use crate::transfer::TransferError;

/// Account store: balance reads and updates, in or outside a transaction
pub struct AccountStore;

impl AccountStore {
    // ========================================================================
    // Inside a transaction context
    // ========================================================================

    /// Read an account as of the context's snapshot
    pub async fn get_in<T: TxContext>(tx: &mut T, owner: &str) -> Result<Account, TransferError> {
        tx.find_account(owner)
            .await?
            .ok_or_else(|| TransferError::AccountNotFound(owner.to_string()))
    }

    /// `balance += delta` inside the caller's context. No overdraft check.
    pub async fn adjust_balance<T: TxContext>(
        tx: &mut T,
        owner: &str,
        delta: i64,
    ) -> Result<Account, TransferError> {
        tx.inc_balance(owner, delta)
            .await?
            .ok_or_else(|| TransferError::AccountNotFound(owner.to_string()))
    }

    /// Accounts visible in the context's snapshot
    pub async fn count_in<T: TxContext>(tx: &mut T) -> Result<u64, TransferError> {
        Ok(tx.count_accounts().await?)
    }

    // ========================================================================
    // Outside any transaction
    // ========================================================================

    /// Latest committed account state
    pub async fn get<B: Backend>(backend: &B, owner: &str) -> Result<Account, TransferError> {
        backend
            .find_account(owner)
            .await?
            .ok_or_else(|| TransferError::AccountNotFound(owner.to_string()))
    }

    /// Single-record `balance += delta`. Waits for a record locked by an
    /// in-flight transaction, up to `options.max_time`.
    pub async fn increase_balance<B: Backend>(
        backend: &B,
        owner: &str,
        delta: i64,
        options: &OpOptions,
    ) -> Result<Account, TransferError> {
        backend
            .inc_balance(owner, delta, options)
            .await?
            .ok_or_else(|| TransferError::AccountNotFound(owner.to_string()))
    }

    /// Create an account with an opening balance
    pub async fn create<B: Backend>(
        backend: &B,
        owner: &str,
        balance: i64,
    ) -> Result<Account, TransferError> {
        let account = Account::new(owner, balance);
        if !backend.insert_account(&account).await? {
            debug!(owner, "Account already exists");
            return Err(TransferError::DuplicateAccount(owner.to_string()));
        }
        info!(owner, balance, "Account created");
        Ok(account)
    }

    pub async fn list<B: Backend>(backend: &B) -> Result<Vec<Account>, TransferError> {
        Ok(backend.list_accounts().await?)
    }

    pub async fn count<B: Backend>(backend: &B) -> Result<u64, TransferError> {
        Ok(backend.count_accounts().await?)
    }

    pub async fn delete<B: Backend>(backend: &B, owner: &str) -> Result<(), TransferError> {
        if !backend.delete_account(owner).await? {
            return Err(TransferError::AccountNotFound(owner.to_string()));
        }
        info!(owner, "Account deleted");
        Ok(())
    }
}
