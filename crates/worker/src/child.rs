//! The worker-child entry.
//!
//! Runs inside the per-job process created by
//! [`ProcessLauncher`](crate::launcher::ProcessLauncher): reads one
//! [`JobSpec`] from stdin, runs the configured pipeline, and writes one
//! [`WorkerReport`] to stdout. Pipeline failures are reported in-band; a
//! non-zero exit is reserved for transport problems (unreadable stdin,
//! unwritable stdout), which the dispatcher records as a worker crash.

use clipnote_core::job::{JobArtifacts, JobSpec, WorkerReport};
use clipnote_pipeline::{ExecPipeline, Pipeline, PipelineError};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::WorkerConfig;

/// Transport errors between dispatcher and worker child.
#[derive(Debug, Error)]
pub enum ChildError {
    #[error("failed to read job descriptor from stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("malformed job descriptor: {0}")]
    BadSpec(#[source] serde_json::Error),

    #[error("failed to write report to stdout: {0}")]
    Stdout(#[source] std::io::Error),
}

/// Process one job and report the outcome.
pub async fn run(config: &WorkerConfig) -> Result<(), ChildError> {
    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .map_err(ChildError::Stdin)?;
    let spec: JobSpec = serde_json::from_str(raw.trim()).map_err(ChildError::BadSpec)?;

    tracing::info!(job_id = spec.job_id, target = %spec.target, "Worker processing job");
    let report = process(config, &spec).await;

    let payload = serde_json::to_vec(&report).expect("report serialization is infallible");
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&payload).await.map_err(ChildError::Stdout)?;
    stdout.flush().await.map_err(ChildError::Stdout)?;
    Ok(())
}

/// Run the pipeline and fold every failure into a report.
async fn process(config: &WorkerConfig, spec: &JobSpec) -> WorkerReport {
    let pipeline = match &config.pipeline_cmd {
        Some(cmdline) => match ExecPipeline::new(cmdline) {
            Ok(pipeline) => pipeline,
            Err(e) => return WorkerReport::failed(spec.job_id, e.to_string()),
        },
        None => {
            return WorkerReport::failed(spec.job_id, PipelineError::NotConfigured.to_string())
        }
    };

    match pipeline.process(spec).await {
        Ok(output) => {
            tracing::info!(job_id = spec.job_id, "Pipeline finished");
            WorkerReport::completed(
                spec.job_id,
                JobArtifacts {
                    published_url: output.published_url,
                    artifact_path: output.artifact_path,
                },
            )
        }
        Err(e) => {
            tracing::warn!(job_id = spec.job_id, error = %e, "Pipeline failed");
            WorkerReport::failed(spec.job_id, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use clipnote_core::job::{JobOptions, ReportStatus};

    use super::*;
    use crate::launcher::SpawnMode;

    fn config_with_pipeline(cmd: Option<&str>) -> WorkerConfig {
        WorkerConfig {
            db_path: "/tmp/unused.db".into(),
            log_path: "/tmp/unused.log".into(),
            worker_count: 1,
            poll_interval: std::time::Duration::from_secs(1),
            shutdown_grace: std::time::Duration::from_secs(1),
            spawn_mode: SpawnMode::Reexec,
            pipeline_cmd: cmd.map(str::to_string),
        }
    }

    fn spec() -> JobSpec {
        JobSpec {
            job_id: 12,
            target: "https://videos.example/watch?v=abc".to_string(),
            options: JobOptions::default(),
        }
    }

    #[tokio::test]
    async fn missing_pipeline_command_fails_in_band() {
        let report = process(&config_with_pipeline(None), &spec()).await;
        assert_eq!(report.status, ReportStatus::Failed);
        assert!(report.error.unwrap().contains("no pipeline command"));
    }

    #[tokio::test]
    async fn broken_pipeline_command_fails_in_band() {
        let report = process(
            &config_with_pipeline(Some("/nonexistent/clipnote-process")),
            &spec(),
        )
        .await;
        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.job_id, 12);
    }
}
