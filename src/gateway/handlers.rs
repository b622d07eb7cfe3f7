//! Gateway HTTP handlers

pub mod account;
pub mod health;
pub mod transfer;

pub use account::{create_account, delete_account, get_account_transactions, list_accounts};
pub use health::health_check;
pub use transfer::create_transfer;
