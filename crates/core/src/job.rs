//! Wire types exchanged between the dispatcher and its worker processes.
//!
//! A claimed job is serialized as a [`JobSpec`] onto the worker child's
//! stdin; the child answers with a single [`WorkerReport`] JSON document on
//! stdout. Both sides of the pipe use these definitions, so they live in
//! the zero-dependency leaf crate.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Per-job parameters chosen by the producer at enqueue time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOptions {
    /// Transcript/content language code, e.g. `"en"` or `"pt-BR"`.
    pub language: String,
    /// Skip the publish step and keep only the local artifact.
    #[serde(default)]
    pub skip_publish: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            skip_publish: false,
        }
    }
}

/// Everything a worker process needs to run one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub job_id: DbId,
    /// Opaque resource identifier handed to the pipeline (typically a URL).
    pub target: String,
    pub options: JobOptions,
}

/// Outcome reported by a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Completed,
    Failed,
}

/// Output locations recorded for a successfully completed job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobArtifacts {
    /// Reference to the published page, when publishing ran.
    pub published_url: Option<String>,
    /// Path of the locally written output file.
    pub artifact_path: Option<String>,
}

/// The single JSON document a worker child writes to stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerReport {
    pub job_id: DbId,
    pub status: ReportStatus,
    #[serde(default)]
    pub artifacts: JobArtifacts,
    /// Present only when `status` is `failed`.
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkerReport {
    /// Build a success report.
    pub fn completed(job_id: DbId, artifacts: JobArtifacts) -> Self {
        Self {
            job_id,
            status: ReportStatus::Completed,
            artifacts,
            error: None,
        }
    }

    /// Build a failure report carrying the error message.
    pub fn failed(job_id: DbId, error: impl Into<String>) -> Self {
        Self {
            job_id,
            status: ReportStatus::Failed,
            artifacts: JobArtifacts::default(),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_round_trips_as_json() {
        let report = WorkerReport::completed(
            7,
            JobArtifacts {
                published_url: Some("https://pages.example/abc".into()),
                artifact_path: Some("/tmp/out.md".into()),
            },
        );
        let json = serde_json::to_string(&report).unwrap();
        let back: WorkerReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job_id, 7);
        assert_eq!(back.status, ReportStatus::Completed);
        assert_eq!(back.artifacts.artifact_path.as_deref(), Some("/tmp/out.md"));
        assert!(back.error.is_none());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ReportStatus::Failed).unwrap();
        assert_eq!(json, "\"failed\"");
    }

    #[test]
    fn spec_defaults_skip_publish_to_false() {
        let spec: JobSpec = serde_json::from_str(
            r#"{"job_id":1,"target":"https://example.com/v","options":{"language":"en"}}"#,
        )
        .unwrap();
        assert!(!spec.options.skip_publish);
    }
}
