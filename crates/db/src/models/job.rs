//! Job entity models and DTOs.

use clipnote_core::job::{JobOptions, JobSpec};
use clipnote_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::status::{JobStatus, StatusId};

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub target: String,
    pub language: String,
    pub skip_publish: bool,
    pub status_id: StatusId,
    pub error_message: Option<String>,
    pub published_url: Option<String>,
    pub artifact_path: Option<String>,
    pub claimed_by_pid: Option<i64>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl Job {
    /// Decode the status column, defaulting unknown ids to `Failed` so a
    /// corrupted row can never present as claimable.
    pub fn status(&self) -> JobStatus {
        JobStatus::from_id(self.status_id).unwrap_or(JobStatus::Failed)
    }

    /// The wire form handed to a worker process.
    pub fn to_spec(&self) -> JobSpec {
        JobSpec {
            job_id: self.id,
            target: self.target.clone(),
            options: JobOptions {
                language: self.language.clone(),
                skip_publish: self.skip_publish,
            },
        }
    }
}

/// DTO for inserting a new pending job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub target: String,
    pub options: JobOptions,
}

/// Per-status job totals for the status summary line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}
