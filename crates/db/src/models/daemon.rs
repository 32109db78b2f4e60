//! The daemon singleton row.

use clipnote_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

use super::status::{DaemonStatus, StatusId};

/// The single row of `daemon_state` (`id` is always 1).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DaemonState {
    pub id: i64,
    pub pid: Option<i64>,
    pub status_id: StatusId,
    pub started_at: Option<Timestamp>,
    pub worker_count: i64,
}

impl DaemonState {
    pub fn status(&self) -> DaemonStatus {
        DaemonStatus::from_id(self.status_id).unwrap_or(DaemonStatus::Stopped)
    }
}
