//! Transactional persistence backend
//!
//! The transfer core never talks to a database directly. It consumes the
//! contract defined here:
//!
//! - [`Backend`] - outside-of-transaction document primitives + session factory
//! - [`Session`] - scoped resource, must be ended on every exit path
//! - [`TxContext`] - snapshot-isolated transaction context
//!
//! # Isolation contract
//!
//! ```text
//! start_transaction()      first in-context op          commit()/abort()
//!        │                        │                             │
//!        ▼                        ▼                             ▼
//!   SnapshotPending ───────────▶ Active ───────────────────▶ ended
//!   (outside commits here        (snapshot fixed: later
//!    are still visible)           outside commits invisible)
//! ```
//!
//! - Outside operations read the latest committed state and never see
//!   uncommitted writes.
//! - The second context to write a record already written by another
//!   in-flight context (or modified after its snapshot) fails with a
//!   transient write conflict.
//!
//! Implementations:
//! - [`memory::MemoryBackend`] - in-process MVCC store
//! - [`postgres::PostgresBackend`] - PostgreSQL `REPEATABLE READ`

pub mod memory;
pub mod postgres;
pub mod schema;

pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Account, NewTransfer, TransferRecord};

// ============================================================================
// Raw backend failure
// ============================================================================

/// Label attached to failures that abort a transaction but may succeed if
/// the whole transaction is run again.
pub const TRANSIENT_TRANSACTION_ERROR: &str = "TransientTransactionError";

/// Error codes reported by the in-memory backend
pub mod codes {
    pub const WRITE_CONFLICT: &str = "WriteConflict";
    pub const MAX_TIME_EXPIRED: &str = "MaxTimeMSExpired";
    pub const OVERFLOW: &str = "Overflow";
    pub const INTERNAL: &str = "InternalError";
}

/// Raw failure reported by a backend.
///
/// Carries what a driver reports (code, message, labels) without deciding
/// what it means for the transfer; see `transfer::ConflictClassifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub code: Option<String>,
    pub message: String,
    pub labels: Vec<String>,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            labels: Vec::new(),
        }
    }

    /// Failure without a backend code (connectivity, driver internals)
    pub fn uncoded(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn write_conflict(key: &str) -> Self {
        Self::new(
            codes::WRITE_CONFLICT,
            format!(
                "WriteConflict error on {}: this operation conflicted with another operation. \
                 Please retry your operation or multi-document transaction.",
                key
            ),
        )
        .with_label(TRANSIENT_TRANSACTION_ERROR)
    }

    pub fn time_limit_exceeded() -> Self {
        Self::new(codes::MAX_TIME_EXPIRED, "operation exceeded time limit")
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for BackendError {}

// ============================================================================
// Options
// ============================================================================

/// Visibility level requested for reads inside a transaction.
///
/// Every level yields a snapshot fixed at the first in-context operation;
/// on a single node `Majority` acknowledges the same data as `Local`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadConcern {
    #[default]
    Local,
    Majority,
    Snapshot,
}

impl ReadConcern {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadConcern::Local => "local",
            ReadConcern::Majority => "majority",
            ReadConcern::Snapshot => "snapshot",
        }
    }
}

/// Durability level requested for the commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteConcern {
    /// `w: 0` - the backend does not report write results
    Unacknowledged,
    /// `w: 1`
    #[default]
    Acknowledged,
    /// `w: majority` - commit is flushed before acknowledging
    Majority,
}

impl WriteConcern {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteConcern::Unacknowledged => "unacknowledged",
            WriteConcern::Acknowledged => "acknowledged",
            WriteConcern::Majority => "majority",
        }
    }
}

/// Options for one transaction context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub read_concern: ReadConcern,
    pub write_concern: WriteConcern,
    /// Budget for the whole context, measured from `start_transaction`
    pub max_time: Option<Duration>,
}

impl TxOptions {
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn with_write_concern(mut self, write_concern: WriteConcern) -> Self {
        self.write_concern = write_concern;
        self
    }
}

/// Options for one outside-of-transaction operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpOptions {
    /// How long to wait for a record locked by an in-flight transaction.
    /// `None` falls back to the backend's default lock wait.
    pub max_time: Option<Duration>,
}

impl OpOptions {
    pub fn max_time(max_time: Duration) -> Self {
        Self {
            max_time: Some(max_time),
        }
    }
}

// ============================================================================
// Contract
// ============================================================================

/// Transactional document store consumed by the transfer core
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    type Session: Session;

    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Open a session. The caller must `end()` it on every exit path.
    async fn start_session(&self) -> Result<Self::Session, BackendError>;

    /// Latest committed account state
    async fn find_account(&self, owner: &str) -> Result<Option<Account>, BackendError>;

    /// Non-transactional `balance += delta`. Waits (up to the budget) for a
    /// record locked by an in-flight transaction. `Ok(None)` if missing.
    async fn inc_balance(
        &self,
        owner: &str,
        delta: i64,
        options: &OpOptions,
    ) -> Result<Option<Account>, BackendError>;

    /// Insert a new account. `Ok(false)` if the owner already exists.
    async fn insert_account(&self, account: &Account) -> Result<bool, BackendError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, BackendError>;

    async fn count_accounts(&self) -> Result<u64, BackendError>;

    /// Remove an account. `Ok(false)` if it did not exist.
    async fn delete_account(&self, owner: &str) -> Result<bool, BackendError>;

    /// Committed transfers where `owner` is sender or receiver, oldest first
    async fn find_transfers(&self, owner: &str) -> Result<Vec<TransferRecord>, BackendError>;

    async fn count_transfers(&self) -> Result<u64, BackendError>;
}

/// Scoped backend session
#[async_trait]
pub trait Session: Send {
    type Transaction: TxContext;

    /// Begin a transaction context. Its snapshot is established by the first
    /// operation issued through it, not here.
    async fn start_transaction(
        &mut self,
        options: &TxOptions,
    ) -> Result<Self::Transaction, BackendError>;

    /// Release the session
    async fn end(self) -> Result<(), BackendError>;
}

/// Snapshot-isolated transaction context.
///
/// Dropping a context without `commit` or `abort` aborts it.
#[async_trait]
pub trait TxContext: Send {
    /// Whether the first in-context operation has fixed the snapshot
    fn snapshot_established(&self) -> bool;

    async fn find_account(&mut self, owner: &str) -> Result<Option<Account>, BackendError>;

    /// `balance += delta` inside the context. `Ok(None)` if the account is not
    /// part of the snapshot or was deleted after it.
    async fn inc_balance(
        &mut self,
        owner: &str,
        delta: i64,
    ) -> Result<Option<Account>, BackendError>;

    /// Insert a ledger entry. `Ok(None)` if the write did not register.
    async fn insert_transfer(
        &mut self,
        transfer: &NewTransfer,
    ) -> Result<Option<TransferRecord>, BackendError>;

    /// Number of accounts visible in the snapshot
    async fn count_accounts(&mut self) -> Result<u64, BackendError>;

    /// Make every in-context write visible atomically
    async fn commit(self) -> Result<(), BackendError>;

    /// Discard every in-context write
    async fn abort(self) -> Result<(), BackendError>;
}
