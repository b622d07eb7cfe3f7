//! Transfer handler

use std::sync::Arc;

use axum::extract::{Query, State};

use super::super::state::AppState;
use super::super::types::{ApiResult, CreateTransferParams, TransferCreatedData, ok};
use crate::persistence::Backend;

/// POST /transactions?from=&to=&value=
pub async fn create_transfer<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
    Query(params): Query<CreateTransferParams>,
) -> ApiResult<TransferCreatedData> {
    let (from, to, amount) = params.validate()?;

    match state.transfers.create_transfer(&from, &to, amount).await {
        Ok(transfer_id) => ok(TransferCreatedData { transfer_id }),
        Err(e) => {
            tracing::warn!(from = %from, to = %to, amount, code = e.code(), "Transfer rejected: {}", e);
            Err(e.into())
        }
    }
}
