//! The pipeline collaborator boundary.
//!
//! The queue subsystem treats per-job work (fetch, transform, publish) as
//! opaque: a worker process hands a [`JobSpec`](clipnote_core::job::JobSpec)
//! to a [`Pipeline`] and records whatever comes back. [`ExecPipeline`] is
//! the production adapter; [`NoOpPipeline`] exists for tests and smoke runs.

use clipnote_core::job::JobSpec;
use serde::{Deserialize, Serialize};

pub mod error;
pub mod exec;

pub use error::PipelineError;
pub use exec::ExecPipeline;

/// What a pipeline produced for a successfully processed job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOutput {
    /// Reference to the published page, when publishing ran.
    pub published_url: Option<String>,
    /// Path of the locally written output file.
    pub artifact_path: Option<String>,
}

/// Trait implemented by pipeline adapters.
///
/// An adapter receives one job descriptor and either returns output
/// artifacts or an error describing the failure. It runs inside an
/// isolated worker process, so it may block, allocate, or crash without
/// affecting the dispatch loop.
pub trait Pipeline: Send + Sync {
    /// Process one job.
    fn process(
        &self,
        spec: &JobSpec,
    ) -> impl std::future::Future<Output = Result<PipelineOutput, PipelineError>> + Send;
}

/// A pipeline that immediately succeeds with empty output.
#[derive(Debug, Default, Clone)]
pub struct NoOpPipeline;

impl Pipeline for NoOpPipeline {
    async fn process(&self, _spec: &JobSpec) -> Result<PipelineOutput, PipelineError> {
        Ok(PipelineOutput::default())
    }
}
