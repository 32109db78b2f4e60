use std::path::PathBuf;
use std::time::Duration;

use crate::launcher::SpawnMode;

/// Worker configuration loaded from environment variables.
///
/// All fields have defaults suitable for a single-user install; override
/// via environment variables (a `.env` file is honored by the binary).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Path of the SQLite queue database.
    pub db_path: PathBuf,
    /// File the daemon's output is appended to.
    pub log_path: PathBuf,
    /// Maximum number of jobs processed in parallel.
    pub worker_count: u32,
    /// Delay between dispatcher polls.
    pub poll_interval: Duration,
    /// How long shutdown waits for in-flight jobs before recording them
    /// as failed.
    pub shutdown_grace: Duration,
    /// How worker processes are created.
    pub spawn_mode: SpawnMode,
    /// Command line of the pipeline executable, if configured.
    pub pipeline_cmd: Option<String>,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                  |
    /// |---------------------------------|--------------------------|
    /// | `CLIPNOTE_DB_PATH`              | `~/.clipnote/queue.db`   |
    /// | `CLIPNOTE_LOG_PATH`             | `~/.clipnote/worker.log` |
    /// | `CLIPNOTE_WORKER_COUNT`         | `2`                      |
    /// | `CLIPNOTE_POLL_INTERVAL_SECS`   | `3`                      |
    /// | `CLIPNOTE_SHUTDOWN_GRACE_SECS`  | `30`                     |
    /// | `CLIPNOTE_SPAWN_MODE`           | `reexec`                 |
    /// | `CLIPNOTE_PIPELINE_CMD`         | unset                    |
    pub fn from_env() -> Self {
        let db_path = std::env::var("CLIPNOTE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir().join("queue.db"));

        let log_path = std::env::var("CLIPNOTE_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir().join("worker.log"));

        let worker_count: u32 = std::env::var("CLIPNOTE_WORKER_COUNT")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("CLIPNOTE_WORKER_COUNT must be a valid u32");

        let poll_interval_secs: u64 = std::env::var("CLIPNOTE_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .expect("CLIPNOTE_POLL_INTERVAL_SECS must be a valid u64");

        let shutdown_grace_secs: u64 = std::env::var("CLIPNOTE_SHUTDOWN_GRACE_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("CLIPNOTE_SHUTDOWN_GRACE_SECS must be a valid u64");

        let spawn_mode = std::env::var("CLIPNOTE_SPAWN_MODE")
            .map(|v| SpawnMode::parse(&v).expect("CLIPNOTE_SPAWN_MODE must be 'reexec' or 'helper:<path>'"))
            .unwrap_or(SpawnMode::Reexec);

        let pipeline_cmd = std::env::var("CLIPNOTE_PIPELINE_CMD")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Self {
            db_path,
            log_path,
            worker_count: worker_count.max(1),
            poll_interval: Duration::from_secs(poll_interval_secs),
            shutdown_grace: Duration::from_secs(shutdown_grace_secs),
            spawn_mode,
            pipeline_cmd,
        }
    }
}

/// Per-user data directory, `~/.clipnote` (falls back to the working
/// directory when `HOME` is unset).
fn data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".clipnote")
}
