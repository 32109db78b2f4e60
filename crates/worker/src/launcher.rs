//! Worker process creation.
//!
//! Each claimed job runs in its own OS process so a crashing or hanging
//! pipeline can never corrupt or block the dispatch loop. [`SpawnMode`] is
//! the policy for how that process comes to be; both variants exec a fresh
//! process image, so no worker ever inherits the memory of an initialized
//! runtime.

use std::path::PathBuf;
use std::process::Stdio;

use clipnote_core::job::{JobSpec, WorkerReport};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per worker (1 MiB).
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// How much stderr to keep when a worker crashes.
const STDERR_TAIL_BYTES: usize = 2048;

/// Errors from launching a worker process or collecting its report.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn worker process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker process I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker exited without writing a report.
    #[error("worker exited with code {exit_code}: {stderr}")]
    Crashed { exit_code: i32, stderr: String },

    #[error("worker produced a malformed report: {0}")]
    MalformedReport(String),
}

/// How worker processes are created. A platform/packaging policy: it may
/// change process-creation cost, never job semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnMode {
    /// Re-execute the current executable with the hidden worker-child
    /// argument. Always available, including single-binary installs.
    Reexec,
    /// Spawn a dedicated minimal helper executable whose only entry is
    /// the worker-child loop. Useful when the main binary is heavy and a
    /// packaged install ships the slim helper alongside it.
    Helper(PathBuf),
}

impl SpawnMode {
    /// Parse the configuration form: `reexec` or `helper:<path>`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("reexec") {
            return Some(Self::Reexec);
        }
        let path = value.strip_prefix("helper:")?.trim();
        if path.is_empty() {
            return None;
        }
        Some(Self::Helper(PathBuf::from(path)))
    }

    /// Build the command that starts one worker process.
    fn worker_command(&self) -> std::io::Result<Command> {
        match self {
            Self::Reexec => {
                let exe = std::env::current_exe()?;
                let mut cmd = Command::new(exe);
                cmd.arg("run-job");
                Ok(cmd)
            }
            Self::Helper(path) => Ok(Command::new(path)),
        }
    }
}

/// The seam between the dispatcher and actual process creation.
///
/// Production uses [`ProcessLauncher`]; tests drive the dispatcher with a
/// scripted implementation instead of real processes.
pub trait WorkerLauncher: Send + Sync + 'static {
    /// Run one job to completion in a worker and return its report.
    fn launch(
        &self,
        spec: JobSpec,
    ) -> impl std::future::Future<Output = Result<WorkerReport, LaunchError>> + Send;
}

impl<T: WorkerLauncher> WorkerLauncher for std::sync::Arc<T> {
    async fn launch(&self, spec: JobSpec) -> Result<WorkerReport, LaunchError> {
        T::launch(self, spec).await
    }
}

/// Launches one OS process per job according to the configured
/// [`SpawnMode`], piping the [`JobSpec`] in and the [`WorkerReport`] out
/// as JSON.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    mode: SpawnMode,
    /// Extra environment for worker children (the pipeline command, so a
    /// helper binary needs no config of its own).
    env: Vec<(String, String)>,
}

impl ProcessLauncher {
    pub fn new(mode: SpawnMode, env: Vec<(String, String)>) -> Self {
        Self { mode, env }
    }
}

impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, spec: JobSpec) -> Result<WorkerReport, LaunchError> {
        let mut cmd = self.mode.worker_command()?;
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let job_id = spec.job_id;
        tracing::debug!(job_id, "Spawning worker process");

        let mut child = cmd.spawn().map_err(LaunchError::Spawn)?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(&spec).unwrap_or_default();
            // Best-effort write; a worker that dies before reading is
            // reported through its exit status below.
            let _ = stdin.write_all(&payload).await;
            drop(stdin);
        }

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
        let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

        // No timeout: a hung worker occupies its slot until the daemon
        // stops.
        let status = child.wait().await?;
        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(LaunchError::Crashed {
                exit_code: status.code().unwrap_or(-1),
                stderr: tail(stderr.trim(), STDERR_TAIL_BYTES),
            });
        }

        let stdout = String::from_utf8_lossy(&stdout_bytes);
        let report: WorkerReport = serde_json::from_str(stdout.trim())
            .map_err(|e| LaunchError::MalformedReport(e.to_string()))?;

        if report.job_id != job_id {
            return Err(LaunchError::MalformedReport(format!(
                "report names job {} but job {} was dispatched",
                report.job_id, job_id,
            )));
        }
        Ok(report)
    }
}

/// Read an entire output stream into a byte buffer, capped at
/// [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

/// Last `max` bytes of `s`, on a char boundary.
fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
