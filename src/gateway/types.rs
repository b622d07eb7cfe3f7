//! Gateway types module
//!
//! ## Input Types
//! - [`CreateAccountParams`], [`CreateTransferParams`]: query parameters
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ApiError`]: error envelope, converted from `TransferError`

pub mod request;
pub mod response;

// Re-export commonly used types at module root
pub use request::{CreateAccountParams, CreateTransferParams};
pub use response::{
    AccountDeletedData, ApiError, ApiResponse, ApiResult, HealthResponse, TransferCreatedData,
    error_codes, ok,
};
