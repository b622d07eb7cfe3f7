//! Account management handlers

use std::sync::Arc;

use axum::extract::{Path, Query, State};

use super::super::state::AppState;
use super::super::types::{AccountDeletedData, ApiResult, CreateAccountParams, ok};
use crate::account::AccountStore;
use crate::ledger::TransferLedger;
use crate::models::{Account, TransferRecord};
use crate::persistence::Backend;

/// POST /accounts?owner=&balance=
pub async fn create_account<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    Query(params): Query<CreateAccountParams>,
) -> ApiResult<Account> {
    let (owner, balance) = params.validate()?;
    let account = AccountStore::create(state.backend.as_ref(), &owner, balance).await?;
    ok(account)
}

/// GET /accounts
pub async fn list_accounts<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
) -> ApiResult<Vec<Account>> {
    ok(AccountStore::list(state.backend.as_ref()).await?)
}

/// DELETE /accounts/{owner}
pub async fn delete_account<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    Path(owner): Path<String>,
) -> ApiResult<AccountDeletedData> {
    AccountStore::delete(state.backend.as_ref(), &owner).await?;
    ok(AccountDeletedData { owner })
}

/// GET /accounts/{owner}/transactions
pub async fn get_account_transactions<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    Path(owner): Path<String>,
) -> ApiResult<Vec<TransferRecord>> {
    ok(TransferLedger::for_owner(state.backend.as_ref(), &owner).await?)
}
