//! External-command pipeline adapter.
//!
//! Runs a configured program per job, writing the job descriptor as JSON
//! to its stdin and parsing its stdout as a [`PipelineOutput`] document.
//! There is deliberately no kill timer here: a hung command occupies its
//! worker slot until the daemon stops.

use std::process::Stdio;

use clipnote_core::job::JobSpec;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::error::PipelineError;
use crate::{Pipeline, PipelineOutput};

/// Maximum stdout or stderr size captured per stream (1 MiB). The output
/// document is one small JSON object; anything past the cap is dropped.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// How much stderr to keep in an error message.
const STDERR_TAIL_BYTES: usize = 2048;

/// Pipeline adapter that delegates to an external command.
#[derive(Debug, Clone)]
pub struct ExecPipeline {
    program: String,
    args: Vec<String>,
}

impl ExecPipeline {
    /// Build from a whitespace-separated command line, e.g.
    /// `"/usr/local/libexec/clipnote-process --publish"`. No shell quoting
    /// is interpreted.
    pub fn new(command_line: &str) -> Result<Self, PipelineError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(PipelineError::NotConfigured)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Pipeline for ExecPipeline {
    async fn process(&self, spec: &JobSpec) -> Result<PipelineOutput, PipelineError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            job_id = spec.job_id,
            program = %self.program,
            "Running pipeline command",
        );

        let mut child = cmd.spawn()?;

        // Write the job descriptor to stdin, then close it. If the command
        // exits without reading, the write error is irrelevant.
        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(spec).unwrap_or_default();
            let _ = stdin.write_all(&payload).await;
            drop(stdin);
        }

        // Read stdout/stderr in spawned tasks so `child.wait()` can run
        // concurrently without deadlocking on full pipes.
        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
        let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

        let status = child.wait().await?;
        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(PipelineError::Failed {
                exit_code: status.code().unwrap_or(-1),
                stderr: tail(stderr.trim(), STDERR_TAIL_BYTES),
            });
        }

        let stdout = String::from_utf8_lossy(&stdout_bytes);
        serde_json::from_str(stdout.trim())
            .map_err(|e| PipelineError::MalformedOutput(e.to_string()))
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

#[cfg(test)]
mod tests {
    use clipnote_core::job::JobOptions;

    use super::*;

    /// Helper to create a temporary shell script from the given body.
    fn write_temp_script(body: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let mut f = tempfile::Builder::new()
            .suffix(".sh")
            .tempfile()
            .expect("create temp file");
        writeln!(f, "#!/bin/sh").expect("write shebang");
        write!(f, "{body}").expect("write body");
        let mut perms = f.as_file().metadata().expect("metadata").permissions();
        perms.set_mode(0o755);
        f.as_file().set_permissions(perms).expect("chmod");
        f
    }

    fn spec() -> JobSpec {
        JobSpec {
            job_id: 1,
            target: "https://videos.example/watch?v=abc".to_string(),
            options: JobOptions::default(),
        }
    }

    fn pipeline_for(script: &tempfile::NamedTempFile) -> ExecPipeline {
        ExecPipeline::new(script.path().to_str().expect("path")).expect("pipeline")
    }

    #[test]
    fn empty_command_line_is_not_configured() {
        assert!(matches!(
            ExecPipeline::new("   "),
            Err(PipelineError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn output_document_round_trips() {
        let script = write_temp_script(
            "cat > /dev/null\necho '{\"published_url\":\"https://pages.example/p\",\"artifact_path\":\"/tmp/out.md\"}'\n",
        );
        let output = pipeline_for(&script).process(&spec()).await.expect("process");
        assert_eq!(output.published_url.as_deref(), Some("https://pages.example/p"));
        assert_eq!(output.artifact_path.as_deref(), Some("/tmp/out.md"));
    }

    #[tokio::test]
    async fn command_sees_the_job_descriptor_on_stdin() {
        // Echo the received target back as the artifact path.
        let script = write_temp_script(
            "input=$(cat)\n\
             case \"$input\" in\n\
             *videos.example*) echo '{\"artifact_path\":\"saw-target\"}' ;;\n\
             *) echo '{}' ;;\n\
             esac\n",
        );
        let output = pipeline_for(&script).process(&spec()).await.expect("process");
        assert_eq!(output.artifact_path.as_deref(), Some("saw-target"));
    }

    #[tokio::test]
    async fn nonzero_exit_becomes_failed() {
        let script = write_temp_script("echo 'fetch blew up' >&2\nexit 42\n");
        let err = pipeline_for(&script).process(&spec()).await.unwrap_err();
        match err {
            PipelineError::Failed { exit_code, stderr } => {
                assert_eq!(exit_code, 42);
                assert!(stderr.contains("fetch blew up"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_stdout_becomes_malformed_output() {
        let script = write_temp_script("cat > /dev/null\necho 'not json at all'\n");
        let err = pipeline_for(&script).process(&spec()).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn missing_program_is_an_io_error() {
        let pipeline = ExecPipeline::new("/nonexistent/clipnote-process").expect("pipeline");
        let err = pipeline.process(&spec()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn tail_keeps_the_end() {
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("ab", 3), "ab");
    }
}
