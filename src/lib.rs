//! Atomic Transfer - snapshot-isolated money transfers
//!
//! Moves an amount between two account records and records the movement in
//! an append-only ledger, all inside one transaction context. Concurrent
//! writers are detected, not serialized: the loser gets a write conflict and
//! the whole transfer is retried a bounded number of times.
//!
//! # Modules
//!
//! - [`core_types`] - Owner, Balance, Amount, TransferId
//! - [`models`] - Account and ledger record types
//! - [`persistence`] - Backend contract, in-memory MVCC store, PostgreSQL store
//! - [`db`] - PostgreSQL connection pool
//! - [`account`] - AccountStore
//! - [`ledger`] - TransferLedger
//! - [`transfer`] - Classifier, retry policy, coordinator FSM, service
//! - [`gateway`] - HTTP routes
//! - [`config`] / [`logging`] - process bootstrap

// Core types - must be first!
pub mod core_types;
pub mod models;

// Storage
pub mod db;
pub mod persistence;

// Transfer components
pub mod account;
pub mod ledger;
pub mod transfer;

// Process surface
pub mod config;
pub mod gateway;
pub mod logging;

// Convenient re-exports at crate root
pub use account::AccountStore;
pub use core_types::{Amount, Balance, Owner, TransferId};
pub use ledger::TransferLedger;
pub use models::{Account, NewTransfer, TransferRecord};
pub use persistence::{
    Backend, BackendError, MemoryBackend, OpOptions, PostgresBackend, ReadConcern, Session,
    TxContext, TxOptions, WriteConcern,
};
pub use transfer::{
    ConflictClassifier, CoordinatorState, FailureClass, RetryConfig, RetryPolicy,
    TransferCoordinator, TransferError, TransferRequest, TransferService,
};
