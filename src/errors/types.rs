//! Error type definitions for the BirdNET datastore
//!
//! Errors are layered: repositories raise [`RepositoryError`], the species
//! cache wraps those in [`SpeciesCacheError`] with the lookup that failed,
//! and detection construction raises [`ValidationError`].

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (SeaORM)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Species cache errors
    #[error("Species cache error: {0}")]
    SpeciesCache(#[from] SpeciesCacheError),

    /// Detection validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database connection failures
    #[error("Database connection failed: {message}")]
    ConnectionFailed { message: String },

    /// SQL query execution failures
    #[error("Query failed: {query} - {message}")]
    QueryFailed { query: String, message: String },

    /// Database errors from SeaORM
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Constraint violations (unique, foreign key, etc.)
    #[error("Constraint violation: {constraint} - {message}")]
    ConstraintViolation { constraint: String, message: String },

    /// Record not found
    #[error("Record not found: {table} with {field} = {value}")]
    RecordNotFound {
        table: String,
        field: String,
        value: String,
    },

    /// Input rejected by the repository before touching storage
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Operation refused because of the record's current state
    #[error("Conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },

    /// Stored value could not be converted to its domain representation
    #[error("Conversion failed for {field}: {message}")]
    Conversion { field: String, message: String },

    /// The caller's cancellation token fired before the operation finished
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },
}

impl RepositoryError {
    /// Create a record-not-found error
    pub fn not_found<T, F, V>(table: T, field: F, value: V) -> Self
    where
        T: Into<String>,
        F: Into<String>,
        V: ToString,
    {
        Self::RecordNotFound {
            table: table.into(),
            field: field.into(),
            value: value.to_string(),
        }
    }

    /// Create a validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict<R: Into<String>, M: Into<String>>(resource: R, message: M) -> Self {
        Self::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled<S: Into<String>>(operation: S) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Whether the requested record is absent from the backing store
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::RecordNotFound { .. } | Self::Database(sea_orm::DbErr::RecordNotFound(_))
        )
    }

    /// Whether the operation was abandoned because of cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Detection construction failures
///
/// Raised at the point of construction, before a detection is shared with
/// the cache, the mapper or any repository.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("source node must not be empty")]
    EmptySourceNode,

    #[error("either a scientific name or a common name is required")]
    MissingSpeciesName,

    #[error("confidence {0} is outside the range [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("occurrence {0} is outside the range [0, 1]")]
    OccurrenceOutOfRange(f64),

    #[error("end time {end} is before begin time {begin}")]
    EndBeforeBegin {
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Which index a species lookup went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum LookupKind {
    Id,
    ScientificName,
    EbirdCode,
}

/// Species cache errors
///
/// The cache never suppresses or downgrades a repository error; it only adds
/// the lookup context.
#[derive(Error, Debug)]
pub enum SpeciesCacheError {
    /// A keyed lookup missed the cache and the repository failed
    #[error("species lookup by {kind} '{key}' failed: {source}")]
    Lookup {
        kind: LookupKind,
        key: String,
        #[source]
        source: RepositoryError,
    },

    /// Repository error passed through unchanged (get-or-create)
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Bulk listing for a cache refresh failed
    #[error("species cache refresh failed: {source}")]
    Refresh {
        #[source]
        source: RepositoryError,
    },
}

impl SpeciesCacheError {
    /// The underlying repository error
    pub fn repository_error(&self) -> &RepositoryError {
        match self {
            Self::Lookup { source, .. } | Self::Refresh { source } => source,
            Self::Repository(source) => source,
        }
    }

    /// Whether the species is absent from the repository
    pub fn is_not_found(&self) -> bool {
        self.repository_error().is_not_found()
    }

    /// Whether the repository call was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.repository_error().is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_carries_kind_and_key() {
        let err = SpeciesCacheError::Lookup {
            kind: LookupKind::EbirdCode,
            key: "amecro".to_string(),
            source: RepositoryError::not_found("species", "species_code", "amecro"),
        };

        let message = err.to_string();
        assert!(message.contains("ebird_code"));
        assert!(message.contains("'amecro'"));
        assert!(err.is_not_found());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_repository_passthrough_is_transparent() {
        let inner = RepositoryError::validation("scientific_name", "must not be empty");
        let expected = inner.to_string();
        let err = SpeciesCacheError::from(inner);

        assert_eq!(err.to_string(), expected);
        assert!(matches!(
            err.repository_error(),
            RepositoryError::Validation { .. }
        ));
    }
}
