//! Daemon lifecycle: supervision from the CLI side and the runtime entry
//! that executes inside the daemon process.
//!
//! The daemon is spawned as a fresh detached process (re-exec of this
//! binary, never a memory-copying fork) with its output appended to the
//! log file. Supervisor and daemon meet only through the store's
//! `daemon_state` row: the supervisor reports success once the daemon has
//! registered itself there with a matching pid.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use clipnote_core::types::Timestamp;
use clipnote_db::models::status::DaemonStatus;
use clipnote_db::repositories::{DaemonStateRepo, JobRepo};
use clipnote_db::DbError;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::dispatcher::Dispatcher;
use crate::launcher::ProcessLauncher;
use crate::procutil;

/// How many times start/stop poll for the daemon to come up or go down.
const POLL_ATTEMPTS: u32 = 10;

/// Delay between polls; together with [`POLL_ATTEMPTS`] this bounds the
/// wait at 5 seconds.
const POLL_DELAY: Duration = Duration::from_millis(500);

/// Errors from daemon supervision.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("failed to spawn daemon process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to prepare log file {path}: {source}")]
    Log {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to signal daemon: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result of a start request.
#[derive(Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: i64 },
    AlreadyRunning { pid: i64 },
    /// The process exited early or never registered; the log says why.
    Failed { log_path: PathBuf },
}

/// Result of a stop request. State is marked stopped in every case.
#[derive(Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
    /// SIGTERM was delivered but the process outlived the bounded wait.
    StillRunning { pid: i64 },
}

/// Verified daemon status.
#[derive(Debug, PartialEq, Eq)]
pub enum DaemonHealth {
    Running {
        pid: i64,
        worker_count: i64,
        started_at: Option<Timestamp>,
    },
    /// The store says running but the recorded pid is dead.
    Stale { pid: Option<i64> },
    Stopped,
}

/// Start the daemon unless one is already running.
pub async fn start(
    pool: &SqlitePool,
    config: &WorkerConfig,
    worker_count: u32,
) -> Result<StartOutcome, DaemonError> {
    let state = DaemonStateRepo::get(pool).await?;
    if state.status() == DaemonStatus::Running {
        if let Some(pid) = state.pid.filter(|&p| procutil::pid_alive(p)) {
            return Ok(StartOutcome::AlreadyRunning { pid });
        }
        // Stale record from a crashed daemon; go ahead and start fresh.
        tracing::debug!(pid = ?state.pid, "Ignoring stale daemon record");
    }

    let log_file = open_log(&config.log_path)?;
    let log_file_err = log_file.try_clone().map_err(|e| DaemonError::Log {
        path: config.log_path.display().to_string(),
        source: e,
    })?;

    let exe = std::env::current_exe().map_err(DaemonError::Spawn)?;
    let mut cmd = std::process::Command::new(exe);
    {
        use std::os::unix::process::CommandExt;
        cmd.arg("run-daemon")
            .arg("--workers")
            .arg(worker_count.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_file_err))
            // Own process group: the daemon outlives this CLI process and
            // never receives its terminal signals.
            .process_group(0);
    }

    let mut child = cmd.spawn().map_err(DaemonError::Spawn)?;
    let child_pid = child.id() as i64;

    for _ in 0..POLL_ATTEMPTS {
        tokio::time::sleep(POLL_DELAY).await;

        if let Ok(Some(status)) = child.try_wait() {
            tracing::error!(%status, "Daemon process exited during startup");
            return Ok(StartOutcome::Failed {
                log_path: config.log_path.clone(),
            });
        }

        let state = DaemonStateRepo::get(pool).await?;
        if state.status() == DaemonStatus::Running && state.pid == Some(child_pid) {
            return Ok(StartOutcome::Started { pid: child_pid });
        }
    }

    Ok(StartOutcome::Failed {
        log_path: config.log_path.clone(),
    })
}

/// Stop the daemon. Best-effort: state is marked stopped even when the
/// process did not exit within the bounded wait.
pub async fn stop(pool: &SqlitePool) -> Result<StopOutcome, DaemonError> {
    let state = DaemonStateRepo::get(pool).await?;

    let pid = match (state.status(), state.pid) {
        (DaemonStatus::Running, Some(pid)) if procutil::pid_alive(pid) => pid,
        (DaemonStatus::Running, _) => {
            // Recorded running but nothing alive behind it.
            DaemonStateRepo::set(pool, None, DaemonStatus::Stopped, state.worker_count).await?;
            return Ok(StopOutcome::NotRunning);
        }
        _ => return Ok(StopOutcome::NotRunning),
    };

    if let Err(e) = procutil::terminate(pid) {
        // The daemon may have exited between the liveness probe and the
        // signal; anything else is a real failure.
        if e.raw_os_error() != Some(libc::ESRCH) {
            return Err(DaemonError::Signal(e));
        }
    }
    tracing::info!(pid, "Sent termination signal to daemon");

    let mut exited = false;
    for _ in 0..POLL_ATTEMPTS {
        tokio::time::sleep(POLL_DELAY).await;
        if !procutil::pid_alive(pid) {
            exited = true;
            break;
        }
    }

    DaemonStateRepo::set(pool, None, DaemonStatus::Stopped, state.worker_count).await?;

    if exited {
        Ok(StopOutcome::Stopped)
    } else {
        Ok(StopOutcome::StillRunning { pid })
    }
}

/// Read the store's view of the daemon and verify it against the live
/// process table.
pub async fn status(pool: &SqlitePool) -> Result<DaemonHealth, DaemonError> {
    let state = DaemonStateRepo::get(pool).await?;
    match (state.status(), state.pid) {
        (DaemonStatus::Running, Some(pid)) if procutil::pid_alive(pid) => {
            Ok(DaemonHealth::Running {
                pid,
                worker_count: state.worker_count,
                started_at: state.started_at,
            })
        }
        (DaemonStatus::Running, pid) => Ok(DaemonHealth::Stale { pid }),
        _ => Ok(DaemonHealth::Stopped),
    }
}

/// The daemon runtime. Runs inside the detached process spawned by
/// [`start`]; never called from the CLI path.
pub async fn run_daemon(config: &WorkerConfig, worker_count: u32) -> Result<(), DaemonError> {
    let pool = clipnote_db::connect(&config.db_path).await?;
    clipnote_db::health_check(&pool).await?;
    let pid = std::process::id() as i64;

    DaemonStateRepo::set(&pool, Some(pid), DaemonStatus::Running, worker_count as i64).await?;
    tracing::info!(pid, worker_count, "Daemon started");

    // Jobs orphaned by a previous crash become claimable again before the
    // first dispatch tick.
    let reset = JobRepo::reset_stuck(&pool).await?;
    if reset > 0 {
        tracing::info!(reset, "Reset orphaned jobs from a previous run");
    }

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let env = config
        .pipeline_cmd
        .iter()
        .map(|cmd| ("CLIPNOTE_PIPELINE_CMD".to_string(), cmd.clone()))
        .collect();
    let launcher = ProcessLauncher::new(config.spawn_mode.clone(), env);

    let dispatcher = Dispatcher::new(
        pool.clone(),
        launcher,
        worker_count as usize,
        config.poll_interval,
        config.shutdown_grace,
    );
    dispatcher.run(cancel).await;

    DaemonStateRepo::set(&pool, None, DaemonStatus::Stopped, worker_count as i64).await?;
    tracing::info!("Daemon stopped");
    Ok(())
}

/// Trip the cancellation token on SIGTERM or SIGINT.
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            signal(SignalKind::terminate()).expect("SIGTERM handler installation failed");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("SIGINT handler installation failed");
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
            _ = sigint.recv() => tracing::info!("Received SIGINT"),
        }
        cancel.cancel();
    });
}

fn open_log(path: &std::path::Path) -> Result<std::fs::File, DaemonError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DaemonError::Log {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| DaemonError::Log {
            path: path.display().to_string(),
            source: e,
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    use super::*;

    async fn test_pool() -> (SqlitePool, TempDir) {
        let dir = TempDir::new().unwrap();
        let pool = clipnote_db::connect(&dir.path().join("queue.db"))
            .await
            .unwrap();
        (pool, dir)
    }

    #[tokio::test]
    async fn status_reports_stopped_on_a_fresh_store() {
        let (pool, _dir) = test_pool().await;
        assert_matches!(status(&pool).await.unwrap(), DaemonHealth::Stopped);
    }

    #[tokio::test]
    async fn status_verifies_the_recorded_pid() {
        let (pool, _dir) = test_pool().await;

        // A live pid (this test process) reads as running.
        let own_pid = std::process::id() as i64;
        DaemonStateRepo::set(&pool, Some(own_pid), DaemonStatus::Running, 2)
            .await
            .unwrap();
        assert_matches!(
            status(&pool).await.unwrap(),
            DaemonHealth::Running { pid, worker_count: 2, .. } if pid == own_pid
        );

        // A dead pid behind a running record reads as stale.
        DaemonStateRepo::set(&pool, Some(999_999_999), DaemonStatus::Running, 2)
            .await
            .unwrap();
        assert_matches!(
            status(&pool).await.unwrap(),
            DaemonHealth::Stale { pid: Some(999_999_999) }
        );
    }

    #[tokio::test]
    async fn stop_clears_a_stale_record() {
        let (pool, _dir) = test_pool().await;
        DaemonStateRepo::set(&pool, Some(999_999_999), DaemonStatus::Running, 2)
            .await
            .unwrap();

        assert_matches!(stop(&pool).await.unwrap(), StopOutcome::NotRunning);
        assert_matches!(status(&pool).await.unwrap(), DaemonHealth::Stopped);
    }

    #[tokio::test]
    async fn stop_without_a_daemon_is_a_no_op() {
        let (pool, _dir) = test_pool().await;
        assert_matches!(stop(&pool).await.unwrap(), StopOutcome::NotRunning);
    }
}
