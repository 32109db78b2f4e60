//! The `clipnote` command-line surface.
//!
//! Public subcommands cover the producer (`enqueue`, `jobs`) and daemon
//! control (`worker start|stop|status`). Two hidden subcommands are the
//! process entries the supervisor and launcher re-exec into: `run-daemon`
//! and `run-job`.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use clipnote_core::job::JobOptions;
use clipnote_core::validation::{validate_language, validate_target};
use clipnote_db::models::job::NewJob;
use clipnote_db::models::status::DaemonStatus;
use clipnote_db::repositories::{DaemonStateRepo, JobRepo};

use crate::config::WorkerConfig;
use crate::daemon::{self, StartOutcome, StopOutcome};
use crate::{child, render};

#[derive(Parser)]
#[command(
    name = "clipnote",
    about = "Queue content-processing jobs and run them in the background"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Queue a new job for background processing.
    Enqueue {
        /// Content URL to process.
        target: String,
        /// Content language code.
        #[arg(long, default_value = "en")]
        language: String,
        /// Keep the local artifact but skip the publish step.
        #[arg(long)]
        skip_publish: bool,
    },
    /// Show recent jobs and the daemon status.
    Jobs {
        /// Maximum number of jobs to list.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Control the background worker daemon.
    #[command(subcommand)]
    Worker(WorkerCommand),
    /// Daemon runtime entry (spawned by `worker start`).
    #[command(hide = true)]
    RunDaemon {
        #[arg(long)]
        workers: u32,
    },
    /// Single-job worker entry (spawned by the daemon).
    #[command(hide = true)]
    RunJob,
}

#[derive(Subcommand)]
enum WorkerCommand {
    /// Start the daemon.
    Start {
        /// Parallel worker processes (defaults to the configured count).
        #[arg(long)]
        workers: Option<u32>,
    },
    /// Stop the daemon.
    Stop,
    /// Report whether the daemon is running.
    Status,
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = WorkerConfig::from_env();

    match cli.command {
        Command::Enqueue {
            target,
            language,
            skip_publish,
        } => enqueue(&config, target, language, skip_publish).await,
        Command::Jobs { limit } => jobs(&config, limit).await,
        Command::Worker(cmd) => worker(&config, cmd).await,
        Command::RunDaemon { workers } => {
            daemon::run_daemon(&config, workers.max(1))
                .await
                .context("daemon runtime failed")
        }
        Command::RunJob => child::run(&config).await.context("worker child failed"),
    }
}

async fn enqueue(
    config: &WorkerConfig,
    target: String,
    language: String,
    skip_publish: bool,
) -> anyhow::Result<()> {
    validate_target(&target)?;
    validate_language(&language)?;

    let pool = clipnote_db::connect(&config.db_path).await?;
    let job = JobRepo::enqueue(
        &pool,
        &NewJob {
            target,
            options: JobOptions {
                language,
                skip_publish,
            },
        },
    )
    .await?;
    println!("Queued job #{}", job.id);

    let state = DaemonStateRepo::get(&pool).await?;
    if state.status() == DaemonStatus::Stopped {
        println!("The daemon is not running; start it with `clipnote worker start`.");
    }
    Ok(())
}

async fn jobs(config: &WorkerConfig, limit: i64) -> anyhow::Result<()> {
    let pool = clipnote_db::connect(&config.db_path).await?;
    let jobs = JobRepo::list_recent(&pool, limit).await?;
    let counts = JobRepo::status_counts(&pool).await?;
    let health = daemon::status(&pool).await?;

    println!("{}", render::render_health(&health));
    println!("{}", render::render_jobs(&jobs, &counts));
    Ok(())
}

async fn worker(config: &WorkerConfig, cmd: WorkerCommand) -> anyhow::Result<()> {
    let pool = clipnote_db::connect(&config.db_path).await?;

    match cmd {
        WorkerCommand::Start { workers } => {
            let count = workers.unwrap_or(config.worker_count).max(1);
            match daemon::start(&pool, config, count).await? {
                StartOutcome::Started { pid } => {
                    println!("Daemon started (pid {pid}, {count} workers)");
                    println!("Use `clipnote jobs` to monitor the queue.");
                }
                StartOutcome::AlreadyRunning { pid } => {
                    println!("Daemon already running (pid {pid}); stop it first with `clipnote worker stop`.");
                }
                StartOutcome::Failed { log_path } => {
                    bail!(
                        "daemon failed to start; check the log at {}",
                        log_path.display(),
                    );
                }
            }
        }
        WorkerCommand::Stop => match daemon::stop(&pool).await? {
            StopOutcome::Stopped => println!("Daemon stopped"),
            StopOutcome::NotRunning => println!("No daemon is running"),
            StopOutcome::StillRunning { pid } => {
                println!("Daemon (pid {pid}) was asked to stop but is still shutting down; state cleared.");
            }
        },
        WorkerCommand::Status => {
            println!("{}", render::render_health(&daemon::status(&pool).await?));
        }
    }
    Ok(())
}
