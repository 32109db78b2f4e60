//! Bounded retry for transient SQLite lock contention.
//!
//! The short-lived producer and the long-lived daemon write to the same
//! file. When both hold the write lock at once, SQLite surfaces
//! `SQLITE_BUSY`/`SQLITE_LOCKED`; these are retried here with a doubling
//! backoff instead of leaking to callers.

use std::future::Future;
use std::time::Duration;

use crate::error::DbError;

/// Maximum attempts before the contention error surfaces.
const MAX_ATTEMPTS: u32 = 5;

/// First backoff delay; doubled after each failed attempt.
const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// SQLite primary result codes for lock contention. Extended codes
/// (e.g. `SQLITE_BUSY_SNAPSHOT`) carry the primary code in the low byte.
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

/// Run `op`, retrying only lock-contention errors, up to [`MAX_ATTEMPTS`].
///
/// `op` is invoked fresh on every attempt. Any non-contention error is
/// returned immediately.
pub async fn with_busy_retry<T, F, Fut>(op_name: &'static str, mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut backoff = INITIAL_BACKOFF;

    for attempt in 1..=MAX_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_lock_contention(&err) => {
                if attempt == MAX_ATTEMPTS {
                    tracing::warn!(op = op_name, attempts = attempt, "Giving up on locked database");
                    return Err(DbError::Contended {
                        op: op_name,
                        attempts: attempt,
                    });
                }
                tracing::debug!(
                    op = op_name,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Database locked, retrying",
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(err) => return Err(DbError::Sqlx(err)),
        }
    }

    unreachable!("retry loop always returns")
}

/// True for the SQLite busy/locked family of errors.
fn is_lock_contention(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            match db.code().as_deref().and_then(|c| c.parse::<i64>().ok()) {
                Some(code) => matches!(code & 0xFF, SQLITE_BUSY | SQLITE_LOCKED),
                None => {
                    db.message().contains("database is locked")
                        || db.message().contains("database table is locked")
                }
            }
        }
        _ => false,
    }
}
