//! Centralized error handling for the BirdNET datastore
//!
//! This module provides the error hierarchy shared by the species cache,
//! the detection mapper and the persistence layer.
//!
//! # Error Categories
//!
//! - **Repository Errors**: storage failures, missing records, cancellation
//! - **Validation Errors**: detection construction rejected before any state is shared
//! - **Species Cache Errors**: repository failures wrapped with lookup context
//!
//! # Usage
//!
//! ```rust
//! use birdnet_datastore::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for species cache Results
pub type CacheResult<T> = Result<T, SpeciesCacheError>;
