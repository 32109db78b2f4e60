//! Repository for the `jobs` table.
//!
//! Uses `JobStatus` from `models::status` for all status transitions; no
//! bare status literals appear in queries.

use chrono::Utc;
use clipnote_core::job::JobArtifacts;
use clipnote_core::types::DbId;
use sqlx::SqlitePool;

use crate::error::DbError;
use crate::models::job::{Job, NewJob, StatusCounts};
use crate::models::status::{JobStatus, StatusId};
use crate::retry::with_busy_retry;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, target, language, skip_publish, status_id, \
    error_message, published_url, artifact_path, claimed_by_pid, \
    created_at, started_at, completed_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Stored error messages are cut to this many characters, never rejected.
const MAX_ERROR_LEN: usize = 500;

/// Provides queue operations over background jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job. Returns the stored row with its assigned
    /// id; ids are strictly increasing across the life of the store.
    pub async fn enqueue(pool: &SqlitePool, input: &NewJob) -> Result<Job, DbError> {
        let query = format!(
            "INSERT INTO jobs (target, language, skip_publish, status_id, created_at) \
             VALUES (?, ?, ?, ?, ?) \
             RETURNING {COLUMNS}"
        );
        let created_at = Utc::now();
        with_busy_retry("jobs.enqueue", || {
            sqlx::query_as::<_, Job>(&query)
                .bind(&input.target)
                .bind(&input.options.language)
                .bind(input.options.skip_publish)
                .bind(JobStatus::Pending.id())
                .bind(created_at)
                .fetch_one(pool)
        })
        .await
    }

    /// Atomically claim the oldest pending job for `claimant_pid`.
    ///
    /// A single conditional `UPDATE ... RETURNING` both selects and
    /// transitions the row, so two claimants can never receive the same
    /// job: SQLite serializes the writes and the second UPDATE's subselect
    /// no longer sees the row as pending. Never a read-then-write.
    pub async fn claim_next(pool: &SqlitePool, claimant_pid: i64) -> Result<Option<Job>, DbError> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = ?, started_at = ?, claimed_by_pid = ? \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE status_id = ? \
                 ORDER BY id ASC \
                 LIMIT 1 \
             ) \
             RETURNING {COLUMNS}"
        );
        let started_at = Utc::now();
        with_busy_retry("jobs.claim_next", || {
            sqlx::query_as::<_, Job>(&query)
                .bind(JobStatus::Processing.id())
                .bind(started_at)
                .bind(claimant_pid)
                .bind(JobStatus::Pending.id())
                .fetch_optional(pool)
        })
        .await
    }

    /// Mark a processing job completed, recording its artifacts.
    ///
    /// Returns `true` if the row transitioned. Guarded on the current
    /// status, so calling it again (or on an already-failed job) changes
    /// nothing.
    pub async fn complete(
        pool: &SqlitePool,
        job_id: DbId,
        artifacts: &JobArtifacts,
    ) -> Result<bool, DbError> {
        let completed_at = Utc::now();
        let result = with_busy_retry("jobs.complete", || {
            sqlx::query(
                "UPDATE jobs \
                 SET status_id = ?, completed_at = ?, published_url = ?, artifact_path = ? \
                 WHERE id = ? AND status_id = ?",
            )
            .bind(JobStatus::Completed.id())
            .bind(completed_at)
            .bind(&artifacts.published_url)
            .bind(&artifacts.artifact_path)
            .bind(job_id)
            .bind(JobStatus::Processing.id())
            .execute(pool)
        })
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a processing job failed, recording the error message truncated
    /// to [`MAX_ERROR_LEN`] characters. Idempotent like [`Self::complete`].
    pub async fn fail(pool: &SqlitePool, job_id: DbId, error: &str) -> Result<bool, DbError> {
        let message = truncate_error(error);
        let completed_at = Utc::now();
        let result = with_busy_retry("jobs.fail", || {
            sqlx::query(
                "UPDATE jobs \
                 SET status_id = ?, completed_at = ?, error_message = ? \
                 WHERE id = ? AND status_id = ?",
            )
            .bind(JobStatus::Failed.id())
            .bind(completed_at)
            .bind(&message)
            .bind(job_id)
            .bind(JobStatus::Processing.id())
            .execute(pool)
        })
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Reset every `processing` job back to `pending`, clearing claim
    /// metadata. Run at daemon startup so jobs orphaned by a crash become
    /// claimable again. Returns how many rows were reset.
    pub async fn reset_stuck(pool: &SqlitePool) -> Result<u64, DbError> {
        let result = with_busy_retry("jobs.reset_stuck", || {
            sqlx::query(
                "UPDATE jobs \
                 SET status_id = ?, claimed_by_pid = NULL, started_at = NULL \
                 WHERE status_id = ?",
            )
            .bind(JobStatus::Pending.id())
            .bind(JobStatus::Processing.id())
            .execute(pool)
        })
        .await?;
        Ok(result.rows_affected())
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &SqlitePool, id: DbId) -> Result<Option<Job>, DbError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = ?");
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(job)
    }

    /// Newest-first snapshot for display. `limit` is clamped to
    /// `1..=`[`MAX_LIMIT`]. Read-only; never blocks the writer.
    pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Job>, DbError> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let query = format!("SELECT {COLUMNS} FROM jobs ORDER BY id DESC LIMIT ?");
        let jobs = sqlx::query_as::<_, Job>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await?;
        Ok(jobs)
    }

    /// Per-status totals across the whole log.
    pub async fn status_counts(pool: &SqlitePool) -> Result<StatusCounts, DbError> {
        let rows: Vec<(StatusId, i64)> =
            sqlx::query_as("SELECT status_id, COUNT(*) FROM jobs GROUP BY status_id")
                .fetch_all(pool)
                .await?;

        let mut counts = StatusCounts::default();
        for (status_id, count) in rows {
            match JobStatus::from_id(status_id) {
                Some(JobStatus::Pending) => counts.pending = count,
                Some(JobStatus::Processing) => counts.processing = count,
                Some(JobStatus::Completed) => counts.completed = count,
                Some(JobStatus::Failed) => counts.failed = count,
                None => {}
            }
        }
        Ok(counts)
    }
}

/// Cut an error message to [`MAX_ERROR_LEN`] characters, respecting char
/// boundaries.
fn truncate_error(error: &str) -> String {
    if error.chars().count() <= MAX_ERROR_LEN {
        error.to_string()
    } else {
        error.chars().take(MAX_ERROR_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_error_kept_verbatim() {
        assert_eq!(truncate_error("boom"), "boom");
    }

    #[test]
    fn long_error_cut_to_exact_bound() {
        let long = "x".repeat(MAX_ERROR_LEN + 123);
        let cut = truncate_error(&long);
        assert_eq!(cut.chars().count(), MAX_ERROR_LEN);
    }

    #[test]
    fn multibyte_error_cut_on_char_boundary() {
        let long = "é".repeat(MAX_ERROR_LEN + 1);
        let cut = truncate_error(&long);
        assert_eq!(cut.chars().count(), MAX_ERROR_LEN);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
