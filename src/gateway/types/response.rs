//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `ApiError` / `ApiResult<T>`: handler error path
//! - `error_codes`: Standard error code constants

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::core_types::TransferId;
use crate::transfer::TransferError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// Wrap `data` in a 200 success envelope
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

// ============================================================================
// Error Path
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, error_codes::SERVICE_UNAVAILABLE, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.code, self.msg))).into_response()
    }
}

impl From<TransferError> for ApiError {
    fn from(e: TransferError) -> Self {
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, error_codes::for_transfer_error(&e), e.to_string())
    }
}

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TransferCreatedData {
    pub transfer_id: TransferId,
}

#[derive(Debug, Serialize)]
pub struct AccountDeletedData {
    pub owner: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub backend: &'static str,
    /// Server timestamp in milliseconds
    pub timestamp_ms: i64,
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    use crate::transfer::TransferError;

    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INVALID_AMOUNT: i32 = 1002;

    // Resource errors (4xxx)
    pub const ACCOUNT_NOT_FOUND: i32 = 4001;
    pub const DUPLICATE_ACCOUNT: i32 = 4002;
    pub const WRITE_CONFLICT: i32 = 4091;
    pub const RETRIES_EXHAUSTED: i32 = 4092;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
    pub const TIMEOUT: i32 = 5040;

    pub fn for_transfer_error(e: &TransferError) -> i32 {
        match e {
            TransferError::AccountNotFound(_) => ACCOUNT_NOT_FOUND,
            TransferError::InvalidAmount(_) => INVALID_AMOUNT,
            TransferError::WriteConflict(_) => WRITE_CONFLICT,
            TransferError::RetriesExhausted { .. } => RETRIES_EXHAUSTED,
            TransferError::Timeout(_) => TIMEOUT,
            TransferError::DuplicateAccount(_) => DUPLICATE_ACCOUNT,
            TransferError::InsertFailure
            | TransferError::InvalidStateTransition(_)
            | TransferError::Fatal(_) => INTERNAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_maps_to_status_and_code() {
        let err = ApiError::from(TransferError::AccountNotFound("ghost".into()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.code, error_codes::ACCOUNT_NOT_FOUND);
        assert!(err.msg.contains("ghost"));

        let err = ApiError::from(TransferError::Timeout("slow".into()));
        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.code, error_codes::TIMEOUT);

        let err = ApiError::from(TransferError::RetriesExhausted {
            attempts: 4,
            last: Box::new(TransferError::WriteConflict("busy".into())),
        });
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, error_codes::RETRIES_EXHAUSTED);
    }

    #[test]
    fn test_service_unavailable_response() {
        let err = ApiError::service_unavailable("unavailable");
        assert_eq!(err.code, error_codes::SERVICE_UNAVAILABLE);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_error_envelope_omits_data() {
        let json = serde_json::to_value(ApiResponse::<()>::error(1001, "bad")).unwrap();
        assert_eq!(json["code"], 1001);
        assert_eq!(json["msg"], "bad");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_success_envelope() {
        let json = serde_json::to_value(ApiResponse::success(vec![1, 2])).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["msg"], "ok");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }
}
