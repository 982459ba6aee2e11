//! Shared helpers for the SeaORM repositories

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{RepositoryError, RepositoryResult};

/// Conversions between domain values and column values
pub struct ConversionUtils;

impl ConversionUtils {
    /// Domain ids are unsigned, columns are `INTEGER`
    pub fn id_to_db(id: u32, field: &str) -> RepositoryResult<i32> {
        i32::try_from(id).map_err(|_| RepositoryError::Conversion {
            field: field.to_string(),
            message: format!("id {id} does not fit an INTEGER column"),
        })
    }

    pub fn id_from_db(id: i32, field: &str) -> RepositoryResult<u32> {
        u32::try_from(id).map_err(|_| RepositoryError::Conversion {
            field: field.to_string(),
            message: format!("negative id {id}"),
        })
    }

    /// Durations are stored as whole nanoseconds, saturating at `i64::MAX`
    pub fn duration_to_nanos(duration: Duration) -> i64 {
        i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
    }

    pub fn duration_from_nanos(nanos: i64) -> Duration {
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(0))
    }
}

/// Connection holder shared by the SeaORM repositories
#[derive(Clone)]
pub struct BaseSeaOrmRepository {
    pub connection: Arc<DatabaseConnection>,
}

impl BaseSeaOrmRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_conversion_bounds() {
        assert_eq!(ConversionUtils::id_to_db(42, "id").unwrap(), 42);
        assert!(ConversionUtils::id_to_db(u32::MAX, "id").is_err());
        assert_eq!(ConversionUtils::id_from_db(7, "note_id").unwrap(), 7);
        assert!(matches!(
            ConversionUtils::id_from_db(-1, "note_id"),
            Err(RepositoryError::Conversion { .. })
        ));
    }

    #[test]
    fn test_duration_nanos() {
        let duration = Duration::from_millis(75);
        let nanos = ConversionUtils::duration_to_nanos(duration);
        assert_eq!(nanos, 75_000_000);
        assert_eq!(ConversionUtils::duration_from_nanos(nanos), duration);
        assert_eq!(ConversionUtils::duration_from_nanos(-5), Duration::ZERO);
        assert_eq!(ConversionUtils::duration_to_nanos(Duration::MAX), i64::MAX);
    }
}
