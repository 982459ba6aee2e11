//! Shared helpers for the persistence layer

pub mod database_retry;
pub mod jitter;

pub use database_retry::{RetryConfig, with_retry};
