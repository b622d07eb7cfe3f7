//! In-process MVCC store with snapshot isolation
//!
//! # Layout
//!
//! - every account is a chain of committed versions stamped with a commit
//!   timestamp from a global clock (tombstone = deleted)
//! - a transaction reads the chain at its snapshot timestamp, fixed by its
//!   first operation
//! - transactional writes are buffered in the context's write set and take a
//!   write lock on the record; commit installs them under one new timestamp
//!
//! # Conflicts
//!
//! First writer wins. A transactional write fails with a transient
//! `WriteConflict` when the record is locked by another in-flight context or
//! has a committed version newer than the writer's snapshot. Outside writes
//! never fail on a lock: they wait for it to be released, bounded by their
//! time budget.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::{
    Backend, BackendError, OpOptions, Session, TxContext, TxOptions, WriteConcern, codes,
};
use crate::models::{Account, NewTransfer, TransferRecord};

type TxnId = u64;
type CommitTs = u64;

/// Default wait of an outside write on a locked record
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct Version {
    ts: CommitTs,
    balance: Option<i64>,
}

#[derive(Debug, Default)]
struct StoreState {
    clock: CommitTs,
    accounts: BTreeMap<String, Vec<Version>>,
    transfers: Vec<(CommitTs, TransferRecord)>,
    /// record -> transaction holding its write lock
    locks: HashMap<String, TxnId>,
    /// open transaction -> snapshot (None until its first operation)
    open_transactions: HashMap<TxnId, Option<CommitTs>>,
}

impl StoreState {
    fn tick(&mut self) -> CommitTs {
        self.clock += 1;
        self.clock
    }

    fn latest(&self, owner: &str) -> Option<&Version> {
        self.accounts.get(owner)?.last()
    }

    fn latest_balance(&self, owner: &str) -> Option<i64> {
        self.latest(owner)?.balance
    }

    fn read_at(&self, owner: &str, snapshot: CommitTs) -> Option<i64> {
        self.accounts
            .get(owner)?
            .iter()
            .rev()
            .find(|v| v.ts <= snapshot)?
            .balance
    }

    fn install(&mut self, owner: &str, ts: CommitTs, balance: Option<i64>) {
        self.accounts
            .entry(owner.to_string())
            .or_default()
            .push(Version { ts, balance });
    }

    fn release(&mut self, txn: TxnId) {
        self.locks.retain(|_, holder| *holder != txn);
        self.open_transactions.remove(&txn);
        self.vacuum();
    }

    /// Drop versions no open snapshot can reach any more
    fn vacuum(&mut self) {
        let horizon = self
            .open_transactions
            .values()
            .flatten()
            .min()
            .copied()
            .unwrap_or(self.clock);

        self.accounts.retain(|_, chain| {
            if let Some(keep_from) = chain.iter().rposition(|v| v.ts <= horizon) {
                chain.drain(..keep_from);
            }
            !(chain.len() == 1 && chain[0].balance.is_none() && chain[0].ts <= horizon)
        });
    }
}

struct Shared {
    state: Mutex<StoreState>,
    /// Signalled whenever a transaction releases its locks
    released: Notify,
    lock_wait: Duration,
    next_txn: AtomicU64,
    open_sessions: AtomicUsize,
}

impl Shared {
    fn state(&self) -> Result<MutexGuard<'_, StoreState>, BackendError> {
        self.state
            .lock()
            .map_err(|_| BackendError::new(codes::INTERNAL, "memory store state poisoned"))
    }
}

fn checked_balance(owner: &str, balance: i64, delta: i64) -> Result<i64, BackendError> {
    balance.checked_add(delta).ok_or_else(|| {
        BackendError::new(
            codes::OVERFLOW,
            format!("balance of {} would overflow ({} + {})", owner, balance, delta),
        )
    })
}

// ============================================================================
// Backend
// ============================================================================

/// In-memory snapshot-isolated backend. Cloning shares the same store.
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_lock_wait(DEFAULT_LOCK_WAIT)
    }

    /// Create a store whose outside writes wait at most `lock_wait` for a
    /// locked record when the caller gives no budget
    pub fn with_lock_wait(lock_wait: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(StoreState::default()),
                released: Notify::new(),
                lock_wait,
                next_txn: AtomicU64::new(1),
                open_sessions: AtomicUsize::new(0),
            }),
        }
    }

    /// Sessions started and not yet ended
    pub fn open_sessions(&self) -> usize {
        self.shared.open_sessions.load(Ordering::SeqCst)
    }

    /// Transaction contexts neither committed nor aborted
    pub fn open_transactions(&self) -> usize {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .open_transactions
            .len()
    }

    /// Apply `apply` once `owner` is not locked by any transaction
    async fn write_outside<T>(
        &self,
        owner: &str,
        options: &OpOptions,
        mut apply: impl FnMut(&mut StoreState) -> Result<T, BackendError> + Send,
    ) -> Result<T, BackendError> {
        let deadline = Instant::now() + options.max_time.unwrap_or(self.shared.lock_wait);

        loop {
            let notified = self.shared.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.state()?;
                match state.locks.get(owner) {
                    Some(holder) => {
                        trace!(owner, holder = *holder, "Record locked by transaction, waiting")
                    }
                    None => return apply(&mut state),
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                debug!(owner, "Outside write gave up waiting for lock");
                return Err(BackendError::time_limit_exceeded());
            }
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Session = MemorySession;

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn start_session(&self) -> Result<MemorySession, BackendError> {
        self.shared.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            shared: Arc::clone(&self.shared),
            ended: false,
        })
    }

    async fn find_account(&self, owner: &str) -> Result<Option<Account>, BackendError> {
        let state = self.shared.state()?;
        Ok(state
            .latest_balance(owner)
            .map(|balance| Account::new(owner, balance)))
    }

    async fn inc_balance(
        &self,
        owner: &str,
        delta: i64,
        options: &OpOptions,
    ) -> Result<Option<Account>, BackendError> {
        self.write_outside(owner, options, |state| {
            let Some(current) = state.latest_balance(owner) else {
                return Ok(None);
            };
            let balance = checked_balance(owner, current, delta)?;
            let ts = state.tick();
            state.install(owner, ts, Some(balance));
            Ok(Some(Account::new(owner, balance)))
        })
        .await
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, BackendError> {
        let mut state = self.shared.state()?;
        if state.latest_balance(&account.owner).is_some() {
            return Ok(false);
        }
        let ts = state.tick();
        state.install(&account.owner, ts, Some(account.balance));
        Ok(true)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, BackendError> {
        let state = self.shared.state()?;
        Ok(state
            .accounts
            .iter()
            .filter_map(|(owner, chain)| {
                chain
                    .last()
                    .and_then(|v| v.balance)
                    .map(|balance| Account::new(owner.as_str(), balance))
            })
            .collect())
    }

    async fn count_accounts(&self) -> Result<u64, BackendError> {
        let state = self.shared.state()?;
        Ok(state
            .accounts
            .values()
            .filter(|chain| chain.last().is_some_and(|v| v.balance.is_some()))
            .count() as u64)
    }

    async fn delete_account(&self, owner: &str) -> Result<bool, BackendError> {
        self.write_outside(owner, &OpOptions::default(), |state| {
            if state.latest_balance(owner).is_none() {
                return Ok(false);
            }
            let ts = state.tick();
            state.install(owner, ts, None);
            state.vacuum();
            Ok(true)
        })
        .await
    }

    async fn find_transfers(&self, owner: &str) -> Result<Vec<TransferRecord>, BackendError> {
        let state = self.shared.state()?;
        Ok(state
            .transfers
            .iter()
            .filter(|(_, record)| record.involves(owner))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn count_transfers(&self) -> Result<u64, BackendError> {
        Ok(self.shared.state()?.transfers.len() as u64)
    }
}

// ============================================================================
// Session
// ============================================================================

pub struct MemorySession {
    shared: Arc<Shared>,
    ended: bool,
}

impl MemorySession {
    fn close(&mut self) {
        if !self.ended {
            self.ended = true;
            self.shared.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    type Transaction = MemoryTransaction;

    async fn start_transaction(
        &mut self,
        options: &TxOptions,
    ) -> Result<MemoryTransaction, BackendError> {
        let id = self.shared.next_txn.fetch_add(1, Ordering::SeqCst);
        self.shared.state()?.open_transactions.insert(id, None);

        trace!(
            txn = id,
            read_concern = options.read_concern.as_str(),
            write_concern = options.write_concern.as_str(),
            "Transaction started"
        );

        Ok(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            id,
            options: *options,
            deadline: options.max_time.map(|budget| Instant::now() + budget),
            snapshot: None,
            writes: BTreeMap::new(),
            inserts: Vec::new(),
            finished: false,
        })
    }

    async fn end(self) -> Result<(), BackendError> {
        let mut session = self;
        session.close();
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Transaction context
// ============================================================================

pub struct MemoryTransaction {
    shared: Arc<Shared>,
    id: TxnId,
    options: TxOptions,
    deadline: Option<Instant>,
    snapshot: Option<CommitTs>,
    /// owner -> balance after this context's writes
    writes: BTreeMap<String, i64>,
    inserts: Vec<TransferRecord>,
    finished: bool,
}

impl MemoryTransaction {
    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Entry of every in-context operation: enforce the budget and fix the
    /// snapshot on first use
    fn begin_op(&mut self, state: &mut StoreState) -> Result<CommitTs, BackendError> {
        if self.expired() {
            return Err(BackendError::time_limit_exceeded());
        }
        let snapshot = *self.snapshot.get_or_insert(state.clock);
        state.open_transactions.insert(self.id, Some(snapshot));
        Ok(snapshot)
    }

    fn finish(&mut self, state: &mut StoreState) {
        state.release(self.id);
        self.finished = true;
    }
}

#[async_trait]
impl TxContext for MemoryTransaction {
    fn snapshot_established(&self) -> bool {
        self.snapshot.is_some()
    }

    async fn find_account(&mut self, owner: &str) -> Result<Option<Account>, BackendError> {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.state()?;
        let snapshot = self.begin_op(&mut state)?;

        let balance = match self.writes.get(owner) {
            Some(balance) => Some(*balance),
            None => state.read_at(owner, snapshot),
        };
        Ok(balance.map(|balance| Account::new(owner, balance)))
    }

    async fn inc_balance(
        &mut self,
        owner: &str,
        delta: i64,
    ) -> Result<Option<Account>, BackendError> {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.state()?;
        let snapshot = self.begin_op(&mut state)?;

        if let Some(holder) = state.locks.get(owner)
            && *holder != self.id
        {
            debug!(txn = self.id, holder = *holder, owner, "Write conflict: record locked");
            return Err(BackendError::write_conflict(owner));
        }

        let current = match self.writes.get(owner) {
            Some(balance) => *balance,
            None => match state.latest(owner) {
                Some(Version {
                    ts,
                    balance: Some(balance),
                }) if *ts <= snapshot => *balance,
                Some(Version {
                    balance: Some(_), ..
                }) if state.read_at(owner, snapshot).is_some() => {
                    debug!(txn = self.id, owner, snapshot, "Write conflict: modified after snapshot");
                    return Err(BackendError::write_conflict(owner));
                }
                _ => return Ok(None),
            },
        };

        let balance = checked_balance(owner, current, delta)?;
        self.writes.insert(owner.to_string(), balance);
        state.locks.insert(owner.to_string(), self.id);
        Ok(Some(Account::new(owner, balance)))
    }

    async fn insert_transfer(
        &mut self,
        transfer: &NewTransfer,
    ) -> Result<Option<TransferRecord>, BackendError> {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.state()?;
        self.begin_op(&mut state)?;

        let record = TransferRecord::from_new(transfer);
        self.inserts.push(record.clone());

        if self.options.write_concern == WriteConcern::Unacknowledged {
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn count_accounts(&mut self) -> Result<u64, BackendError> {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.state()?;
        let snapshot = self.begin_op(&mut state)?;

        Ok(state
            .accounts
            .keys()
            .filter(|owner| state.read_at(owner, snapshot).is_some())
            .count() as u64)
    }

    async fn commit(self) -> Result<(), BackendError> {
        let mut tx = self;
        let shared = Arc::clone(&tx.shared);
        let mut state = shared.state()?;

        if tx.expired() {
            tx.finish(&mut state);
            drop(state);
            shared.released.notify_waiters();
            return Err(BackendError::time_limit_exceeded());
        }

        let writes = std::mem::take(&mut tx.writes);
        let inserts = std::mem::take(&mut tx.inserts);
        let (write_count, insert_count) = (writes.len(), inserts.len());

        let commit_ts = if writes.is_empty() && inserts.is_empty() {
            state.clock
        } else {
            let ts = state.tick();
            for (owner, balance) in &writes {
                state.install(owner, ts, Some(*balance));
            }
            state
                .transfers
                .extend(inserts.into_iter().map(|record| (ts, record)));
            ts
        };

        tx.finish(&mut state);
        drop(state);
        shared.released.notify_waiters();

        debug!(
            txn = tx.id,
            commit_ts,
            writes = write_count,
            inserts = insert_count,
            write_concern = tx.options.write_concern.as_str(),
            "Transaction committed"
        );
        Ok(())
    }

    async fn abort(self) -> Result<(), BackendError> {
        let mut tx = self;
        let shared = Arc::clone(&tx.shared);
        {
            let mut state = shared.state()?;
            tx.finish(&mut state);
        }
        shared.released.notify_waiters();

        debug!(txn = tx.id, "Transaction aborted");
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            state.release(self.id);
        }
        self.finished = true;
        self.shared.released.notify_waiters();
        warn!(txn = self.id, "Transaction dropped without commit or abort, rolled back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Amount;

    const DEFAULT_BALANCE: i64 = 1000;

    async fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for owner in ["test1", "test2"] {
            assert!(
                backend
                    .insert_account(&Account::new(owner, DEFAULT_BALANCE))
                    .await
                    .unwrap()
            );
        }
        backend
    }

    async fn balance(backend: &MemoryBackend, owner: &str) -> i64 {
        backend.find_account(owner).await.unwrap().unwrap().balance
    }

    #[tokio::test]
    async fn test_outside_reads_do_not_see_locked_writes() {
        let backend = seeded().await;
        let mut session = backend.start_session().await.unwrap();
        let mut tx = session.start_transaction(&TxOptions::default()).await.unwrap();

        tx.inc_balance("test2", 10).await.unwrap();
        assert_eq!(balance(&backend, "test2").await, DEFAULT_BALANCE);

        tx.commit().await.unwrap();
        assert_eq!(balance(&backend, "test2").await, DEFAULT_BALANCE + 10);
        session.end().await.unwrap();
    }

    #[tokio::test]
    async fn test_transactional_reads_do_not_lock() {
        let backend = seeded().await;
        let mut session = backend.start_session().await.unwrap();
        let mut tx = session.start_transaction(&TxOptions::default()).await.unwrap();

        let in_tx = tx.find_account("test2").await.unwrap().unwrap();
        assert_eq!(in_tx.balance, DEFAULT_BALANCE);

        backend
            .inc_balance("test2", 10, &OpOptions::max_time(Duration::from_millis(50)))
            .await
            .unwrap();

        assert_eq!(balance(&backend, "test2").await, DEFAULT_BALANCE + 10);
        let in_tx = tx.find_account("test2").await.unwrap().unwrap();
        assert_eq!(in_tx.balance, DEFAULT_BALANCE);

        tx.abort().await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_taken_at_first_operation() {
        let backend = seeded().await;
        let mut session = backend.start_session().await.unwrap();
        let mut tx = session.start_transaction(&TxOptions::default()).await.unwrap();
        assert!(!tx.snapshot_established());

        // transaction started, snapshot not taken yet
        backend
            .inc_balance("test2", 10, &OpOptions::default())
            .await
            .unwrap();

        let in_tx = tx.find_account("test2").await.unwrap().unwrap();
        assert!(tx.snapshot_established());
        assert_eq!(in_tx.balance, DEFAULT_BALANCE + 10);

        tx.inc_balance("test2", 10).await.unwrap();
        assert_eq!(balance(&backend, "test2").await, DEFAULT_BALANCE + 10);

        tx.commit().await.unwrap();
        assert_eq!(balance(&backend, "test2").await, DEFAULT_BALANCE + 20);
    }

    #[tokio::test]
    async fn test_outside_write_on_locked_record_times_out() {
        let backend = seeded().await;
        let mut session = backend.start_session().await.unwrap();
        let mut tx = session.start_transaction(&TxOptions::default()).await.unwrap();
        tx.inc_balance("test2", 10).await.unwrap();

        let err = backend
            .inc_balance("test2", 10, &OpOptions::max_time(Duration::from_millis(30)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(codes::MAX_TIME_EXPIRED));
        assert!(err.message.contains("exceeded time limit"));

        tx.commit().await.unwrap();
        assert_eq!(balance(&backend, "test2").await, DEFAULT_BALANCE + 10);
    }

    #[tokio::test]
    async fn test_outside_write_proceeds_after_lock_release() {
        let backend = seeded().await;
        let mut session = backend.start_session().await.unwrap();
        let mut tx = session.start_transaction(&TxOptions::default()).await.unwrap();
        tx.inc_balance("test2", 10).await.unwrap();

        let waiter = {
            let backend = backend.clone();
            tokio::spawn(async move {
                backend
                    .inc_balance("test2", 5, &OpOptions::max_time(Duration::from_secs(5)))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.commit().await.unwrap();

        let after = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(after.balance, DEFAULT_BALANCE + 15);
    }

    #[tokio::test]
    async fn test_second_writer_conflicts() {
        let backend = seeded().await;
        let mut s1 = backend.start_session().await.unwrap();
        let mut s2 = backend.start_session().await.unwrap();
        let mut t1 = s1.start_transaction(&TxOptions::default()).await.unwrap();
        let mut t2 = s2.start_transaction(&TxOptions::default()).await.unwrap();

        t1.inc_balance("test2", 10).await.unwrap();
        let err = t2.inc_balance("test2", 10).await.unwrap_err();
        assert_eq!(err.code(), Some(codes::WRITE_CONFLICT));
        assert!(err.has_label(super::super::TRANSIENT_TRANSACTION_ERROR));

        t2.abort().await.unwrap();
        t1.commit().await.unwrap();
        assert_eq!(balance(&backend, "test2").await, DEFAULT_BALANCE + 10);
    }

    #[tokio::test]
    async fn test_write_after_outside_modification_conflicts() {
        let backend = seeded().await;
        let mut session = backend.start_session().await.unwrap();
        let mut tx = session.start_transaction(&TxOptions::default()).await.unwrap();

        // the snapshot is taken
        tx.inc_balance("test1", 10).await.unwrap();
        // test2 is updated outside
        backend
            .inc_balance("test2", 10, &OpOptions::default())
            .await
            .unwrap();

        let err = tx.inc_balance("test2", 10).await.unwrap_err();
        assert_eq!(err.code(), Some(codes::WRITE_CONFLICT));

        tx.abort().await.unwrap();
        assert_eq!(balance(&backend, "test1").await, DEFAULT_BALANCE);
        assert_eq!(balance(&backend, "test2").await, DEFAULT_BALANCE + 10);
    }

    #[tokio::test]
    async fn test_no_phantom_reads() {
        let backend = seeded().await;
        let mut session = backend.start_session().await.unwrap();
        let mut tx = session.start_transaction(&TxOptions::default()).await.unwrap();

        let before = tx.count_accounts().await.unwrap();
        backend
            .insert_account(&Account::new("test3", 2000))
            .await
            .unwrap();
        let after = tx.count_accounts().await.unwrap();

        assert_eq!(before, after);
        assert_eq!(backend.count_accounts().await.unwrap(), before + 1);
        // inserted after the snapshot: invisible, not a conflict
        assert!(tx.inc_balance("test3", 1).await.unwrap().is_none());
        tx.abort().await.unwrap();
    }

    #[tokio::test]
    async fn test_deleted_after_snapshot_is_not_found() {
        let backend = seeded().await;
        let mut session = backend.start_session().await.unwrap();
        let mut tx = session.start_transaction(&TxOptions::default()).await.unwrap();
        tx.find_account("test1").await.unwrap();

        assert!(backend.delete_account("test2").await.unwrap());
        assert!(tx.inc_balance("test2", 5).await.unwrap().is_none());
        tx.abort().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_transaction_releases_locks() {
        let backend = seeded().await;
        {
            let mut session = backend.start_session().await.unwrap();
            let mut tx = session.start_transaction(&TxOptions::default()).await.unwrap();
            tx.inc_balance("test2", 10).await.unwrap();
            assert_eq!(backend.open_transactions(), 1);
            assert_eq!(backend.open_sessions(), 1);
        }
        assert_eq!(backend.open_transactions(), 0);
        assert_eq!(backend.open_sessions(), 0);

        let after = backend
            .inc_balance("test2", 1, &OpOptions::max_time(Duration::from_millis(10)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.balance, DEFAULT_BALANCE + 1);
    }

    #[tokio::test]
    async fn test_expired_budget_rejects_operations() {
        let backend = seeded().await;
        let mut session = backend.start_session().await.unwrap();
        let opts = TxOptions::default().with_max_time(Duration::ZERO);
        let mut tx = session.start_transaction(&opts).await.unwrap();

        let err = tx.inc_balance("test1", 1).await.unwrap_err();
        assert_eq!(err.code(), Some(codes::MAX_TIME_EXPIRED));
        tx.abort().await.unwrap();
        assert_eq!(balance(&backend, "test1").await, DEFAULT_BALANCE);
    }

    #[tokio::test]
    async fn test_unacknowledged_insert_reports_no_record() {
        let backend = seeded().await;
        let mut session = backend.start_session().await.unwrap();
        let opts = TxOptions::default().with_write_concern(WriteConcern::Unacknowledged);
        let mut tx = session.start_transaction(&opts).await.unwrap();

        let new = NewTransfer {
            from: "test1".into(),
            to: "test2".into(),
            amount: Amount::new(5).unwrap(),
        };
        assert!(tx.insert_transfer(&new).await.unwrap().is_none());
        tx.abort().await.unwrap();
        assert_eq!(backend.count_transfers().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_old_snapshot_survives_vacuum() {
        let backend = seeded().await;
        let mut session = backend.start_session().await.unwrap();
        let mut tx = session.start_transaction(&TxOptions::default()).await.unwrap();
        tx.find_account("test1").await.unwrap();

        for _ in 0..5 {
            let mut other = backend.start_session().await.unwrap();
            let mut writer = other.start_transaction(&TxOptions::default()).await.unwrap();
            writer.inc_balance("test2", 1).await.unwrap();
            writer.commit().await.unwrap();
            other.end().await.unwrap();
        }

        let in_tx = tx.find_account("test2").await.unwrap().unwrap();
        assert_eq!(in_tx.balance, DEFAULT_BALANCE);
        tx.commit().await.unwrap();
        assert_eq!(balance(&backend, "test2").await, DEFAULT_BALANCE + 5);
    }

    #[tokio::test]
    async fn test_overflow_is_rejected() {
        let backend = MemoryBackend::new();
        backend
            .insert_account(&Account::new("rich", i64::MAX))
            .await
            .unwrap();
        let err = backend
            .inc_balance("rich", 1, &OpOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(codes::OVERFLOW));
    }
}
