/// Database layer for larkm
///
/// Manages the SQLite connection pool and the embedded migrations for the
/// ARK table.

use crate::error::{LarkmError, LarkmResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::time::Duration;

/// Database connection options
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub max_connections: u32,
    pub enable_wal: bool,
    pub read_only: bool,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            enable_wal: true,
            read_only: false,
        }
    }
}

/// Create a SQLite connection pool
pub async fn create_pool(path: &Path, options: DatabaseOptions) -> LarkmResult<SqlitePool> {
    // Ensure parent directory exists
    if !options.read_only {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut connect_options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(!options.read_only)
        .read_only(options.read_only)
        .busy_timeout(Duration::from_secs(5));

    // Switching journal mode is a write, so read-only pools keep the file's mode
    if !options.read_only {
        connect_options = connect_options.journal_mode(if options.enable_wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        });
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .connect_with(connect_options)
        .await
        .map_err(LarkmError::Storage)?;

    Ok(pool)
}

/// Single-connection in-memory pool, used by tests and dry runs
pub async fn create_memory_pool() -> LarkmResult<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    Ok(pool)
}

/// Run migrations
/// Migrations are embedded at compile time from ./migrations directory
pub async fn run_migrations(pool: &SqlitePool) -> LarkmResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> LarkmResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}
