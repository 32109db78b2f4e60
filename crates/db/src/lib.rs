//! SQLite-backed job store.
//!
//! One writer process (the daemon) and any number of short-lived readers
//! and producers share a single database file. WAL journal mode keeps
//! reads non-blocking against the writer; a busy timeout plus
//! [`retry::with_busy_retry`] absorb transient lock contention between the
//! producer and the daemon without any external coordination.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

pub mod error;
pub mod models;
pub mod repositories;
pub mod retry;

pub use error::DbError;

/// Embedded migrations, applied on every [`connect`].
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// How long a connection waits on SQLite's internal lock before the error
/// surfaces to [`retry::with_busy_retry`].
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool size. The daemon's dispatch loop is single-threaded, so a handful
/// of connections covers it plus concurrent status reads.
const MAX_CONNECTIONS: u32 = 5;

/// Open (creating if missing) the database at `path` and apply migrations.
pub async fn connect(path: &Path) -> Result<SqlitePool, DbError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DbError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;

    tracing::debug!(path = %path.display(), "Job store opened");
    Ok(pool)
}

/// Cheap connectivity probe.
pub async fn health_check(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
