//! Transfer Coordinator
//!
//! Drives one transfer attempt through the FSM. A coordinator is single-use:
//! retries build a new one, with a new session and transaction context.

use tracing::{debug, info, warn};

use super::error::TransferError;
use super::state::CoordinatorState;
use super::types::TransferRequest;
use crate::account::AccountStore;
use crate::core_types::TransferId;
use crate::ledger::TransferLedger;
use crate::persistence::{Backend, Session, TxContext, TxOptions};

/// Transfer Coordinator - one attempt, one transaction context
pub struct TransferCoordinator<'a, B: Backend> {
    backend: &'a B,
    options: TxOptions,
    state: CoordinatorState,
}

impl<'a, B: Backend> TransferCoordinator<'a, B> {
    pub fn new(backend: &'a B, options: TxOptions) -> Self {
        Self {
            backend,
            options,
            state: CoordinatorState::Idle,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    fn transition(&mut self, next: CoordinatorState) -> Result<(), TransferError> {
        if !self.state.can_transition_to(next) {
            return Err(TransferError::InvalidStateTransition(format!(
                "{} -> {}",
                self.state, next
            )));
        }
        debug!(from = %self.state, to = %next, "Coordinator state transition");
        self.state = next;
        Ok(())
    }

    /// Run the transfer to a terminal state.
    ///
    /// On success every step is committed as one unit. On failure the
    /// context is aborted before the error is returned. The session is ended
    /// on every path.
    pub async fn execute(&mut self, req: &TransferRequest) -> Result<TransferId, TransferError> {
        if self.state != CoordinatorState::Idle {
            return Err(TransferError::InvalidStateTransition(format!(
                "coordinator already used (state {})",
                self.state
            )));
        }

        let mut session = match self.backend.start_session().await {
            Ok(session) => session,
            Err(e) => {
                self.transition(CoordinatorState::Aborted)?;
                warn!(backend = self.backend.name(), error = %e, "Failed to start session");
                return Err(e.into());
            }
        };

        let result = self.run_in_session(&mut session, req).await;

        if let Err(e) = session.end().await {
            warn!(error = %e, "Failed to end session");
        }
        result
    }

    async fn run_in_session(
        &mut self,
        session: &mut B::Session,
        req: &TransferRequest,
    ) -> Result<TransferId, TransferError> {
        let mut tx = match session.start_transaction(&self.options).await {
            Ok(tx) => tx,
            Err(e) => {
                self.transition(CoordinatorState::Aborted)?;
                warn!(error = %e, "Failed to start transaction");
                return Err(e.into());
            }
        };
        self.transition(CoordinatorState::SnapshotPending)?;

        let id = match self.steps(&mut tx, req).await {
            Ok(id) => id,
            Err(e) => {
                if let Err(abort_err) = tx.abort().await {
                    warn!(error = %abort_err, "Abort failed, context dropped");
                }
                self.transition(CoordinatorState::Aborted)?;
                warn!(
                    from = %req.from,
                    to = %req.to,
                    amount = req.amount.get(),
                    code = e.code(),
                    error = %e,
                    "Transfer aborted"
                );
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            self.transition(CoordinatorState::Aborted)?;
            warn!(transfer_id = %id, error = %e, "Commit failed");
            return Err(e.into());
        }
        self.transition(CoordinatorState::Committed)?;

        info!(
            transfer_id = %id,
            from = %req.from,
            to = %req.to,
            amount = req.amount.get(),
            "Transfer committed"
        );
        Ok(id)
    }

    /// Ledger entry, debit, credit - all inside one context
    async fn steps<T: TxContext>(
        &mut self,
        tx: &mut T,
        req: &TransferRequest,
    ) -> Result<TransferId, TransferError> {
        // the first in-context operation fixes the snapshot
        self.transition(CoordinatorState::Active)?;

        let id = TransferLedger::append(tx, &req.from, &req.to, req.amount.get()).await?;
        AccountStore::adjust_balance(tx, &req.from, req.amount.debit()).await?;
        AccountStore::adjust_balance(tx, &req.to, req.amount.get()).await?;
        Ok(id)
    }
}
