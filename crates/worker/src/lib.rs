//! The clipnote worker: dispatcher loop, worker-process launching, daemon
//! supervision, and the `clipnote` CLI.
//!
//! Process layout at runtime:
//! - the short-lived CLI process (`enqueue`, `jobs`, `worker *`),
//! - the detached daemon process hosting [`dispatcher::Dispatcher`],
//! - one worker child process per in-flight job, created according to the
//!   configured [`launcher::SpawnMode`].

pub mod child;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod dispatcher;
pub mod launcher;
pub mod procutil;
pub mod render;
