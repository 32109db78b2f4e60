//! Plain-text rendering for the `jobs` listing.

use chrono::Utc;
use clipnote_db::models::job::{Job, StatusCounts};
use clipnote_db::models::status::JobStatus;

use crate::daemon::DaemonHealth;

/// Width of the target column before truncation.
const TARGET_WIDTH: usize = 48;

/// Width of the info column before truncation.
const INFO_WIDTH: usize = 24;

/// One line describing the daemon.
pub fn render_health(health: &DaemonHealth) -> String {
    match health {
        DaemonHealth::Running {
            pid, worker_count, ..
        } => format!("Daemon: running (pid {pid}, {worker_count} workers)"),
        DaemonHealth::Stale { pid: Some(pid) } => {
            format!("Daemon: stale (recorded pid {pid} is not alive)")
        }
        DaemonHealth::Stale { pid: None } => "Daemon: stale (no pid recorded)".to_string(),
        DaemonHealth::Stopped => "Daemon: stopped".to_string(),
    }
}

/// Tabular listing of recent jobs plus a per-status summary and the
/// published URLs of recently completed jobs.
pub fn render_jobs(jobs: &[Job], counts: &StatusCounts) -> String {
    let mut lines = Vec::new();

    if jobs.is_empty() {
        lines.push("No jobs in queue".to_string());
        return lines.join("\n");
    }

    lines.push(format!(
        "{:>5}  {:<10}  {:<INFO_WIDTH$}  TARGET",
        "ID", "STATUS", "INFO",
    ));
    for job in jobs {
        lines.push(format!(
            "{:>5}  {:<10}  {:<INFO_WIDTH$}  {}",
            job.id,
            job.status().to_string(),
            truncate(&job_info(job), INFO_WIDTH),
            truncate(&job.target, TARGET_WIDTH),
        ));
    }

    lines.push(String::new());
    lines.push(summary_line(counts));

    let published: Vec<&Job> = jobs
        .iter()
        .filter(|j| j.status() == JobStatus::Completed && j.published_url.is_some())
        .take(5)
        .collect();
    if !published.is_empty() {
        lines.push(String::new());
        lines.push("Published:".to_string());
        for job in published {
            lines.push(format!(
                "  #{}: {}",
                job.id,
                job.published_url.as_deref().unwrap_or_default(),
            ));
        }
    }

    lines.join("\n")
}

/// The info column: duration for finished jobs, elapsed time for running
/// ones, the error for failed ones.
fn job_info(job: &Job) -> String {
    match job.status() {
        JobStatus::Completed => match (job.started_at, job.completed_at) {
            (Some(start), Some(end)) => humanize_secs((end - start).num_seconds()),
            _ => String::new(),
        },
        JobStatus::Processing => match job.started_at {
            Some(start) => format!("{} so far", humanize_secs((Utc::now() - start).num_seconds())),
            None => String::new(),
        },
        JobStatus::Failed => job.error_message.clone().unwrap_or_default(),
        JobStatus::Pending => "-".to_string(),
    }
}

fn summary_line(counts: &StatusCounts) -> String {
    let mut parts = Vec::new();
    if counts.completed > 0 {
        parts.push(format!("{} completed", counts.completed));
    }
    if counts.processing > 0 {
        parts.push(format!("{} processing", counts.processing));
    }
    if counts.pending > 0 {
        parts.push(format!("{} pending", counts.pending));
    }
    if counts.failed > 0 {
        parts.push(format!("{} failed", counts.failed));
    }
    if parts.is_empty() {
        "Queue is empty".to_string()
    } else {
        parts.join(", ")
    }
}

/// Human-readable duration from whole seconds.
fn humanize_secs(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
