//! Repository for the `daemon_state` singleton row.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::DbError;
use crate::models::daemon::DaemonState;
use crate::models::status::DaemonStatus;
use crate::retry::with_busy_retry;

/// Column list for `daemon_state` queries.
const COLUMNS: &str = "id, pid, status_id, started_at, worker_count";

/// Read/write access to the daemon singleton. The row is seeded by the
/// initial migration; there is never more than one.
pub struct DaemonStateRepo;

impl DaemonStateRepo {
    /// Read the singleton.
    pub async fn get(pool: &SqlitePool) -> Result<DaemonState, DbError> {
        let query = format!("SELECT {COLUMNS} FROM daemon_state WHERE id = 1");
        let state = sqlx::query_as::<_, DaemonState>(&query)
            .fetch_one(pool)
            .await?;
        Ok(state)
    }

    /// Overwrite the singleton. `started_at` is stamped now when the new
    /// status is `Running` and cleared otherwise.
    pub async fn set(
        pool: &SqlitePool,
        pid: Option<i64>,
        status: DaemonStatus,
        worker_count: i64,
    ) -> Result<(), DbError> {
        let started_at = match status {
            DaemonStatus::Running => Some(Utc::now()),
            DaemonStatus::Stopped => None,
        };
        with_busy_retry("daemon_state.set", || {
            sqlx::query(
                "UPDATE daemon_state \
                 SET pid = ?, status_id = ?, started_at = ?, worker_count = ? \
                 WHERE id = 1",
            )
            .bind(pid)
            .bind(status.id())
            .bind(started_at)
            .bind(worker_count)
            .execute(pool)
        })
        .await?;
        Ok(())
    }
}
