//! Account management module
//!
//! Account records keyed by owner, read and updated either inside a
//! transaction context or as single-record outside operations.

pub mod repository;

pub use repository::AccountStore;
