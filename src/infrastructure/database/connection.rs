//! SQLite connection pool setup. Grounded on the teacher's own
//! `adapters/sqlite/connection.rs`: WAL mode, a busy timeout instead of relying on
//! pool backpressure alone, and directory auto-creation for a file-backed database.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to create parent directory for database file: {0}")]
    DirectoryCreationFailed(#[source] std::io::Error),

    #[error("failed to connect to database: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    #[error("failed to create connection pool: {0}")]
    PoolCreationFailed(#[source] sqlx::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: std::time::Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: std::time::Duration::from_secs(10),
        }
    }
}

/// Opens (and, if necessary, creates) the SQLite database at `database_path` and
/// returns a connection pool configured for WAL mode.
///
/// # Errors
///
/// Returns `ConnectionError::DirectoryCreationFailed` if `database_path`'s parent
/// directory doesn't exist and can't be created, or `ConnectionError::PoolCreationFailed`
/// if `sqlx` fails to establish the pool.
pub async fn create_pool(database_path: &str, config: PoolConfig) -> Result<SqlitePool, ConnectionError> {
    ensure_database_directory(database_path)?;

    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(std::time::Duration::from_secs(30));

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(ConnectionError::PoolCreationFailed)
}

/// Opens an in-memory, single-connection pool for tests.
///
/// # Errors
///
/// Returns `ConnectionError::PoolCreationFailed` if the in-memory database can't be
/// opened (should not happen in practice).
pub async fn create_test_pool() -> Result<SqlitePool, ConnectionError> {
    let options = SqliteConnectOptions::new()
        .filename(":memory:")
        .create_if_missing(true)
        .shared_cache(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(ConnectionError::PoolCreationFailed)
}

fn ensure_database_directory(database_path: &str) -> Result<(), ConnectionError> {
    if database_path == ":memory:" {
        return Ok(());
    }
    let path = Path::new(database_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(ConnectionError::DirectoryCreationFailed)?;
        }
    }
    Ok(())
}

/// Sanity-checks a freshly opened pool.
///
/// # Errors
///
/// Returns the underlying `sqlx::Error` if the connectivity probe query fails.
pub async fn verify_connection(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_in_memory_pool() {
        let pool = create_test_pool().await.expect("pool should open");
        verify_connection(&pool).await.expect("connection should be live");
    }

    #[tokio::test]
    async fn creates_parent_directory_for_file_backed_db() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested").join("mediabroker.db");
        let pool = create_pool(db_path.to_str().unwrap(), PoolConfig::default())
            .await
            .expect("pool should open");
        verify_connection(&pool).await.expect("connection should be live");
        assert!(db_path.parent().unwrap().exists());
    }
}
