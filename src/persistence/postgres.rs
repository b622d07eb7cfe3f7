//! PostgreSQL backend
//!
//! Transaction contexts run at `REPEATABLE READ`: PostgreSQL takes the
//! snapshot at the first statement after `BEGIN`/`SET`, which matches the
//! "snapshot at first operation" contract.
//!
//! Write locks are taken with `SELECT ... FOR UPDATE NOWAIT` so the second
//! writer of a row fails at once instead of queueing behind the first.
//! Outside writes do queue, bounded by `lock_timeout`.
//!
//! A row deleted after the snapshot fails the row lock with a
//! serialization failure; it is reported as missing, not as a conflict.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row};
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{
    Backend, BackendError, OpOptions, Session, TRANSIENT_TRANSACTION_ERROR, TxContext, TxOptions,
    WriteConcern,
};
use crate::core_types::TransferId;
use crate::db::Database;
use crate::models::{Account, NewTransfer, TransferRecord};

/// SQLSTATE codes the transfer core cares about
pub mod sqlstate {
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const QUERY_CANCELED: &str = "57014";
    pub const LOCK_NOT_AVAILABLE: &str = "55P03";
}

/// Build a backend error from a SQLSTATE. Serialization failures and
/// deadlocks are transient: the whole transaction may be run again.
pub fn from_sqlstate(code: &str, message: impl Into<String>) -> BackendError {
    let err = BackendError::new(code, message);
    match code {
        sqlstate::SERIALIZATION_FAILURE | sqlstate::DEADLOCK_DETECTED => {
            err.with_label(TRANSIENT_TRANSACTION_ERROR)
        }
        _ => err,
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => match db.code() {
                Some(code) => from_sqlstate(&code, db.message()),
                None => BackendError::uncoded(db.message()),
            },
            _ => BackendError::uncoded(err.to_string()),
        }
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, BackendError> {
    Ok(Account::new(
        row.try_get::<String, _>("owner")?,
        row.try_get::<i64, _>("balance")?,
    ))
}

fn transfer_from_row(row: &PgRow) -> Result<TransferRecord, BackendError> {
    let raw_id: String = row.try_get("transfer_id")?;
    let id: TransferId = raw_id
        .parse()
        .map_err(|e| BackendError::uncoded(format!("corrupt transfer id {}: {}", raw_id, e)))?;
    Ok(TransferRecord {
        id,
        from: row.try_get("from_owner")?,
        to: row.try_get("to_owner")?,
        amount: row.try_get("amount")?,
        created_at: row.try_get("created_at")?,
    })
}

fn synchronous_commit(write_concern: WriteConcern) -> &'static str {
    match write_concern {
        WriteConcern::Unacknowledged => "off",
        WriteConcern::Acknowledged => "local",
        WriteConcern::Majority => "on",
    }
}

// ============================================================================
// Backend
// ============================================================================

pub struct PostgresBackend {
    db: Arc<Database>,
    lock_wait: Duration,
}

impl PostgresBackend {
    pub fn new(db: Arc<Database>, lock_wait: Duration) -> Self {
        Self { db, lock_wait }
    }

    /// Short transaction for an outside write, bounded by `lock_timeout`
    async fn begin_outside(
        &self,
        options: &OpOptions,
    ) -> Result<sqlx::Transaction<'static, Postgres>, BackendError> {
        let budget = options.max_time.unwrap_or(self.lock_wait);
        let mut tx = self.db.pool().await?.begin().await?;
        // lock_timeout = 0 disables the timeout
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = {}",
            budget.as_millis().max(1)
        ))
        .execute(&mut *tx)
        .await?;
        Ok(tx)
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    type Session = PgSession;

    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn start_session(&self) -> Result<PgSession, BackendError> {
        Ok(PgSession {
            pool: self.db.pool().await?.clone(),
        })
    }

    async fn find_account(&self, owner: &str) -> Result<Option<Account>, BackendError> {
        let row = sqlx::query(r#"SELECT owner, balance FROM accounts_tb WHERE owner = $1"#)
            .bind(owner)
            .fetch_optional(self.db.pool().await?)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn inc_balance(
        &self,
        owner: &str,
        delta: i64,
        options: &OpOptions,
    ) -> Result<Option<Account>, BackendError> {
        let mut tx = self.begin_outside(options).await?;
        let row = sqlx::query(
            r#"UPDATE accounts_tb SET balance = balance + $1
               WHERE owner = $2 RETURNING owner, balance"#,
        )
        .bind(delta)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, BackendError> {
        let result = sqlx::query(
            r#"INSERT INTO accounts_tb (owner, balance) VALUES ($1, $2)
               ON CONFLICT (owner) DO NOTHING"#,
        )
        .bind(&account.owner)
        .bind(account.balance)
        .execute(self.db.pool().await?)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, BackendError> {
        let rows = sqlx::query(r#"SELECT owner, balance FROM accounts_tb ORDER BY owner"#)
            .fetch_all(self.db.pool().await?)
            .await?;
        rows.iter().map(account_from_row).collect()
    }

    async fn count_accounts(&self) -> Result<u64, BackendError> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM accounts_tb"#)
            .fetch_one(self.db.pool().await?)
            .await?;
        Ok(count as u64)
    }

    async fn delete_account(&self, owner: &str) -> Result<bool, BackendError> {
        let mut tx = self.begin_outside(&OpOptions::default()).await?;
        let result = sqlx::query(r#"DELETE FROM accounts_tb WHERE owner = $1"#)
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_transfers(&self, owner: &str) -> Result<Vec<TransferRecord>, BackendError> {
        let rows = sqlx::query(
            r#"SELECT transfer_id, from_owner, to_owner, amount, created_at
               FROM transfers_tb WHERE from_owner = $1 OR to_owner = $1 ORDER BY id"#,
        )
        .bind(owner)
        .fetch_all(self.db.pool().await?)
        .await?;
        rows.iter().map(transfer_from_row).collect()
    }

    async fn count_transfers(&self) -> Result<u64, BackendError> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM transfers_tb"#)
            .fetch_one(self.db.pool().await?)
            .await?;
        Ok(count as u64)
    }
}

// ============================================================================
// Session
// ============================================================================

/// A pooled handle. Connections are checked out per transaction context.
pub struct PgSession {
    pool: PgPool,
}

#[async_trait]
impl Session for PgSession {
    type Transaction = PgTransaction;

    async fn start_transaction(
        &mut self,
        options: &TxOptions,
    ) -> Result<PgTransaction, BackendError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;
        if let Some(max_time) = options.max_time.filter(|d| !d.is_zero()) {
            sqlx::query(&format!(
                "SET LOCAL statement_timeout = {}",
                max_time.as_millis()
            ))
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(&format!(
            "SET LOCAL synchronous_commit = {}",
            synchronous_commit(options.write_concern)
        ))
        .execute(&mut *tx)
        .await?;

        trace!(
            read_concern = options.read_concern.as_str(),
            write_concern = options.write_concern.as_str(),
            "Transaction started"
        );

        Ok(PgTransaction {
            tx,
            pool: self.pool.clone(),
            options: *options,
            deadline: options.max_time.map(|budget| Instant::now() + budget),
            snapshot: false,
        })
    }

    async fn end(self) -> Result<(), BackendError> {
        Ok(())
    }
}

// ============================================================================
// Transaction context
// ============================================================================

/// Dropping the inner `sqlx::Transaction` rolls it back.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
    /// For latest-committed lookups after the context has failed
    pool: PgPool,
    options: TxOptions,
    deadline: Option<Instant>,
    snapshot: bool,
}

impl PgTransaction {
    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn begin_op(&mut self) -> Result<(), BackendError> {
        if self.expired() {
            return Err(BackendError::time_limit_exceeded());
        }
        self.snapshot = true;
        Ok(())
    }

    /// Whether `owner` exists in the latest committed state
    async fn committed_exists(&self, owner: &str) -> Result<bool, BackendError> {
        let row = sqlx::query(r#"SELECT 1 FROM accounts_tb WHERE owner = $1"#)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl TxContext for PgTransaction {
    fn snapshot_established(&self) -> bool {
        self.snapshot
    }

    async fn find_account(&mut self, owner: &str) -> Result<Option<Account>, BackendError> {
        self.begin_op()?;
        let row = sqlx::query(r#"SELECT owner, balance FROM accounts_tb WHERE owner = $1"#)
            .bind(owner)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn inc_balance(
        &mut self,
        owner: &str,
        delta: i64,
    ) -> Result<Option<Account>, BackendError> {
        self.begin_op()?;

        let lock = sqlx::query(r#"SELECT 1 FROM accounts_tb WHERE owner = $1 FOR UPDATE NOWAIT"#)
            .bind(owner)
            .fetch_optional(&mut *self.tx)
            .await;
        match lock {
            Ok(Some(_)) => {}
            Ok(None) => return Ok(None),
            Err(e) => {
                let err = BackendError::from(e);
                match err.code() {
                    Some(sqlstate::LOCK_NOT_AVAILABLE) => {
                        debug!(owner, "Write conflict: row locked");
                        return Err(BackendError::write_conflict(owner));
                    }
                    // a row deleted after the snapshot also fails the lock with 40001
                    Some(sqlstate::SERIALIZATION_FAILURE) if !self.committed_exists(owner).await? => {
                        debug!(owner, "Account deleted after snapshot");
                        return Ok(None);
                    }
                    _ => return Err(err),
                }
            }
        }

        let row = sqlx::query(
            r#"UPDATE accounts_tb SET balance = balance + $1
               WHERE owner = $2 RETURNING owner, balance"#,
        )
        .bind(delta)
        .bind(owner)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn insert_transfer(
        &mut self,
        transfer: &NewTransfer,
    ) -> Result<Option<TransferRecord>, BackendError> {
        self.begin_op()?;
        let record = TransferRecord::from_new(transfer);

        let result = sqlx::query(
            r#"INSERT INTO transfers_tb (transfer_id, from_owner, to_owner, amount, created_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(record.id.to_string())
        .bind(&record.from)
        .bind(&record.to)
        .bind(record.amount)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn count_accounts(&mut self) -> Result<u64, BackendError> {
        self.begin_op()?;
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM accounts_tb"#)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count as u64)
    }

    async fn commit(self) -> Result<(), BackendError> {
        if self.expired() {
            self.tx.rollback().await?;
            return Err(BackendError::time_limit_exceeded());
        }
        let write_concern = self.options.write_concern;
        self.tx.commit().await?;
        debug!(write_concern = write_concern.as_str(), "Transaction committed");
        Ok(())
    }

    async fn abort(self) -> Result<(), BackendError> {
        self.tx.rollback().await?;
        debug!("Transaction aborted");
        Ok(())
    }
}
