//! Concurrency tests: racing claimants and randomized operation
//! sequences must never break the job state machine.

use std::collections::{HashMap, HashSet};

use clipnote_core::job::{JobArtifacts, JobOptions};
use clipnote_db::models::job::NewJob;
use clipnote_db::models::status::JobStatus;
use clipnote_db::repositories::JobRepo;
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn test_pool() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().unwrap();
    let pool = clipnote_db::connect(&dir.path().join("queue.db"))
        .await
        .unwrap();
    (pool, dir)
}

fn new_job(n: usize) -> NewJob {
    NewJob {
        target: format!("https://videos.example/watch?v=race{n}"),
        options: JobOptions::default(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claimants_each_get_a_job_exactly_once() {
    const JOBS: usize = 20;
    const CLAIMANTS: usize = 4;

    let (pool, _dir) = test_pool().await;
    let mut all_ids = HashSet::new();
    for n in 0..JOBS {
        all_ids.insert(JobRepo::enqueue(&pool, &new_job(n)).await.unwrap().id);
    }

    let mut handles = Vec::new();
    for claimant in 0..CLAIMANTS {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let pid = 1000 + claimant as i64;
            let mut claimed = Vec::new();
            while let Some(job) = JobRepo::claim_next(&pool, pid).await.unwrap() {
                assert_eq!(job.claimed_by_pid, Some(pid));
                claimed.push(job.id);
            }
            claimed
        }));
    }

    let mut seen = HashSet::new();
    let mut total = 0;
    for handle in handles {
        for id in handle.await.unwrap() {
            total += 1;
            assert!(seen.insert(id), "job {id} was claimed twice");
        }
    }

    assert_eq!(total, JOBS, "every job must be claimed exactly once");
    assert_eq!(seen, all_ids);
}

/// Legal transitions observed from outside: a status may stay put, move
/// pending→processing, or move processing→terminal. processing→pending is
/// legal only as the explicit crash-recovery reset.
fn transition_ok(prev: JobStatus, next: JobStatus, after_reset: bool) -> bool {
    use JobStatus::*;
    if prev == next {
        return true;
    }
    matches!(
        (prev, next),
        (Pending, Processing) | (Processing, Completed) | (Processing, Failed)
    ) || (after_reset && prev == Processing && next == Pending)
}

#[tokio::test]
async fn randomized_operations_never_skip_or_reverse_a_transition() {
    let (pool, _dir) = test_pool().await;
    let mut rng = fastrand::Rng::with_seed(0x0b5e55ed);
    let mut snapshot: HashMap<i64, JobStatus> = HashMap::new();
    let mut max_id: i64 = 0;

    for round in 0..200 {
        let was_reset = match rng.u32(0..6) {
            0 | 1 => {
                let job = JobRepo::enqueue(&pool, &new_job(round)).await.unwrap();
                max_id = job.id;
                false
            }
            2 => {
                JobRepo::claim_next(&pool, 77).await.unwrap();
                false
            }
            3 => {
                if max_id > 0 {
                    let id = rng.i64(1..=max_id);
                    JobRepo::complete(&pool, id, &JobArtifacts::default())
                        .await
                        .unwrap();
                }
                false
            }
            4 => {
                if max_id > 0 {
                    let id = rng.i64(1..=max_id);
                    JobRepo::fail(&pool, id, "induced failure").await.unwrap();
                }
                false
            }
            _ => {
                JobRepo::reset_stuck(&pool).await.unwrap();
                true
            }
        };

        for job in JobRepo::list_recent(&pool, 100).await.unwrap() {
            let next = job.status();
            if let Some(&prev) = snapshot.get(&job.id) {
                assert!(
                    transition_ok(prev, next, was_reset),
                    "job {} moved {prev} -> {next} (round {round}, reset: {was_reset})",
                    job.id,
                );
            }
            // Field invariants ride along with the status.
            match next {
                JobStatus::Processing => {
                    assert!(job.started_at.is_some());
                    assert!(job.claimed_by_pid.is_some());
                }
                JobStatus::Completed | JobStatus::Failed => {
                    assert!(job.completed_at.is_some());
                }
                JobStatus::Pending => {
                    assert!(job.claimed_by_pid.is_none());
                }
            }
            snapshot.insert(job.id, next);
        }
    }
}
