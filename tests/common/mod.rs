//! Shared setup for the integration tests

use birdnet_datastore::config::DatabaseConfig;
use birdnet_datastore::database::Database;

/// Migrated single-connection in-memory SQLite database
pub async fn migrated_database() -> Database {
    let database = Database::new(&DatabaseConfig::in_memory())
        .await
        .expect("Failed to create test database");
    database.migrate().await.expect("Failed to run migrations");
    database
}
