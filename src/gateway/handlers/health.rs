//! Health check handler

use std::sync::Arc;

use axum::extract::State;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, HealthResponse, ok};
use crate::persistence::Backend;

/// Health check endpoint
///
/// - Healthy: 200 OK + {code: 0, data: {backend, timestamp_ms}}
/// - Unhealthy: 503 Service Unavailable, backend details are only logged
pub async fn health_check<B: Backend>(
    State(state): State<Arc<AppState<B>>>,
) -> ApiResult<HealthResponse> {
    if let Err(e) = state.backend.count_accounts().await {
        tracing::error!(backend = state.backend.name(), error = %e, "Health check failed");
        return Err(ApiError::service_unavailable("unavailable"));
    }
    ok(HealthResponse {
        backend: state.backend.name(),
        timestamp_ms: chrono::Utc::now().timestamp_millis(),
    })
}
