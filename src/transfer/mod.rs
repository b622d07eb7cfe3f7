//! Atomic Transfer Core
//!
//! Moves an amount between two account records and appends a ledger entry,
//! all inside one snapshot-isolated transaction context.
//!
//! # State Machine
//!
//! ```text
//! IDLE → SNAPSHOT_PENDING → ACTIVE → COMMITTED
//!                 ↓            ↓
//!               ABORTED ←──────┘
//! ```
//!
//! # Invariants
//!
//! 1. **Conservation**: a committed transfer leaves the sum of balances unchanged
//! 2. **Atomicity**: ledger entry, debit and credit commit together or not at all
//! 3. **Bounded retry**: only write conflicts are retried, at most `max_retries` times
//! 4. **Scoped resources**: sessions and contexts are released on every exit path

pub mod classifier;
pub mod coordinator;
pub mod error;
pub mod retry;
pub mod service;
pub mod state;
pub mod types;


// Re-exports for convenience
pub use classifier::{ConflictClassifier, FailureClass};
pub use coordinator::TransferCoordinator;
pub use error::TransferError;
pub use retry::{MAX_RETRIES_LIMIT, RetryConfig, RetryConfigError, RetryPolicy};
pub use service::TransferService;
pub use state::CoordinatorState;
pub use types::TransferRequest;
