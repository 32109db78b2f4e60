//! The dispatch loop.
//!
//! A single cooperative loop owns all queue writes on the daemon side:
//! each tick it reaps finished worker slots into `complete`/`fail`
//! records, claims pending jobs into free slots, and sleeps. Parallelism
//! lives entirely in the worker processes; the loop itself never blocks
//! on one.

use std::sync::Arc;
use std::time::Duration;

use clipnote_core::job::{ReportStatus, WorkerReport};
use clipnote_core::types::DbId;
use clipnote_db::repositories::JobRepo;
use sqlx::SqlitePool;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::launcher::{LaunchError, WorkerLauncher};

/// One in-flight job: the claiming record plus the task supervising its
/// worker process.
struct Slot {
    job_id: DbId,
    handle: JoinHandle<Result<WorkerReport, LaunchError>>,
}

/// Claims pending jobs and supervises their worker processes.
pub struct Dispatcher<L: WorkerLauncher> {
    pool: SqlitePool,
    launcher: Arc<L>,
    worker_count: usize,
    poll_interval: Duration,
    shutdown_grace: Duration,
}

impl<L: WorkerLauncher> Dispatcher<L> {
    pub fn new(
        pool: SqlitePool,
        launcher: L,
        worker_count: usize,
        poll_interval: Duration,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            pool,
            launcher: Arc::new(launcher),
            worker_count: worker_count.max(1),
            poll_interval,
            shutdown_grace,
        }
    }

    /// Run the dispatch loop until the cancellation token is triggered,
    /// then drain in-flight slots within the shutdown grace period.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut slots: Vec<Slot> = Vec::new();
        let mut ticker = tokio::time::interval(self.poll_interval);
        tracing::info!(
            worker_count = self.worker_count,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Dispatcher started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Dispatcher shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.reap_finished(&mut slots).await;
                    if let Err(e) = self.fill_slots(&mut slots).await {
                        tracing::error!(error = %e, "Dispatch cycle failed");
                    }
                }
            }
        }

        self.drain(slots).await;
    }

    /// Collect results from slots whose worker has finished and write
    /// them back to the store. Never propagates: a broken worker becomes
    /// a failed job, nothing more.
    async fn reap_finished(&self, slots: &mut Vec<Slot>) {
        let mut i = 0;
        while i < slots.len() {
            if slots[i].handle.is_finished() {
                let slot = slots.swap_remove(i);
                let outcome = slot.handle.await;
                self.record_outcome(slot.job_id, outcome).await;
            } else {
                i += 1;
            }
        }
    }

    /// Claim pending jobs while free capacity remains, dispatching each to
    /// a fresh slot.
    async fn fill_slots(&self, slots: &mut Vec<Slot>) -> Result<(), clipnote_db::DbError> {
        while slots.len() < self.worker_count {
            let claimant = std::process::id() as i64;
            let Some(job) = JobRepo::claim_next(&self.pool, claimant).await? else {
                break;
            };

            tracing::info!(job_id = job.id, target = %job.target, "Job claimed, dispatching");
            let spec = job.to_spec();
            let launcher = Arc::clone(&self.launcher);
            let handle = tokio::spawn(async move { launcher.launch(spec).await });
            slots.push(Slot {
                job_id: job.id,
                handle,
            });
        }
        Ok(())
    }

    /// Translate one slot's outcome into a `complete` or `fail` record.
    async fn record_outcome(
        &self,
        job_id: DbId,
        outcome: Result<Result<WorkerReport, LaunchError>, JoinError>,
    ) {
        let result = match outcome {
            Ok(Ok(report)) => match report.status {
                ReportStatus::Completed => {
                    tracing::info!(job_id, "Job completed");
                    JobRepo::complete(&self.pool, job_id, &report.artifacts).await
                }
                ReportStatus::Failed => {
                    let error = report.error.as_deref().unwrap_or("unknown error");
                    tracing::warn!(job_id, error, "Job failed");
                    JobRepo::fail(&self.pool, job_id, error).await
                }
            },
            Ok(Err(launch_err)) => {
                tracing::error!(job_id, error = %launch_err, "Worker failed");
                JobRepo::fail(&self.pool, job_id, &launch_err.to_string()).await
            }
            Err(join_err) => {
                tracing::error!(job_id, error = %join_err, "Worker slot task panicked");
                JobRepo::fail(&self.pool, job_id, &format!("worker task panicked: {join_err}"))
                    .await
            }
        };

        if let Err(e) = result {
            tracing::error!(job_id, error = %e, "Failed to record job outcome");
        }
    }

    /// Wait up to the grace period for in-flight slots, then record any
    /// survivors as failed. The worker processes themselves are not
    /// signalled; they die with the daemon process.
    async fn drain(&self, mut slots: Vec<Slot>) {
        if slots.is_empty() {
            return;
        }
        tracing::info!(
            in_flight = slots.len(),
            grace_secs = self.shutdown_grace.as_secs(),
            "Waiting for in-flight jobs",
        );

        let deadline = tokio::time::Instant::now() + self.shutdown_grace;
        let mut unfinished = Vec::new();
        for mut slot in slots.drain(..) {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(left, &mut slot.handle).await {
                Ok(outcome) => self.record_outcome(slot.job_id, outcome).await,
                Err(_) => unfinished.push(slot),
            }
        }

        for slot in unfinished {
            tracing::warn!(job_id = slot.job_id, "Job aborted by shutdown");
            if let Err(e) = JobRepo::fail(&self.pool, slot.job_id, "aborted by shutdown").await {
                tracing::error!(job_id = slot.job_id, error = %e, "Failed to record aborted job");
            }
        }
    }
}
