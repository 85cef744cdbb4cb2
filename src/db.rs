//! SQLite pool setup for the session store backend.

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// Connect to the session database and apply migrations.
///
/// Failures are reported, not fatal: the caller downgrades to the
/// in-memory store so the gateway still comes up when the database is
/// unreachable.
pub async fn try_create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the data directory exists for file-backed databases
    if let Some(path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;

    Ok(pool)
}
