use thiserror::Error;

/// Errors from a pipeline adapter.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No pipeline command is configured.
    #[error("no pipeline command configured")]
    NotConfigured,

    /// The pipeline process could not be spawned or its pipes failed.
    #[error("pipeline I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The pipeline process ran but exited non-zero.
    #[error("pipeline exited with code {exit_code}: {stderr}")]
    Failed { exit_code: i32, stderr: String },

    /// The pipeline exited cleanly but its stdout was not a valid output
    /// document.
    #[error("pipeline produced malformed output: {0}")]
    MalformedOutput(String),
}
