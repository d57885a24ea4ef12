//! Run command - tracks a child process tree for the lifetime of one command
//!
//! A private tracker is started, the command runs with `PTRACK_SOCKETPATH`
//! and `PTRACK_TASKID` pointing at it, and the final task tree is printed
//! once the command exits.

use crate::client::TrackerClient;
use crate::config::{TrackerConfig, SOCKET_PATH_ENV, TASK_ID_ENV};
use crate::daemon::TrackerServer;
use crate::progress::{QuerySubject, TaskSnapshot};
use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use std::process::Command;
use std::thread;
use tracing::{debug, info};

/// Socket path used when none is configured.
pub fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join(format!("ptrack-{}.sock", std::process::id()))
}

/// Outcome of a tracked command.
#[derive(Debug)]
pub struct RunResult {
    /// Exit code of the command (1 when it was killed by a signal)
    pub exit_code: i32,
    /// Task tree as reported by the command and its descendants
    pub tasks: Option<TaskSnapshot>,
}

/// Run `command` under a private tracker.
pub fn track(config: TrackerConfig, command: &[String]) -> Result<RunResult> {
    let Some((program, args)) = command.split_first() else {
        bail!("No command given");
    };

    let config = config.with_cleanup(true);
    let mut server = TrackerServer::bind(config.clone())?;
    let handle = server.shutdown_handle();
    let reactor = thread::Builder::new()
        .name("ptrack-reactor".to_string())
        .spawn(move || server.run())
        .context("Failed to start tracker thread")?;

    info!(command = %command.join(" "), "Running tracked command");
    let status = Command::new(program)
        .args(args)
        .env(SOCKET_PATH_ENV, &config.socket_path)
        .env(TASK_ID_ENV, config.default_task_id.to_string())
        .status()
        .with_context(|| format!("Failed to run {program}"));

    let tasks = TrackerClient::connect(&config).query(QuerySubject::Tasks);

    handle.shutdown();
    reactor
        .join()
        .map_err(|_| anyhow!("Tracker thread panicked"))??;

    let status = status?;
    debug!("Tracked command exited with {status}");
    Ok(RunResult {
        exit_code: status.code().unwrap_or(1),
        tasks,
    })
}

/// Run `command`, print the final task tree and return its exit code.
pub fn execute(config: TrackerConfig, command: Vec<String>) -> Result<i32> {
    // The child receives terminal signals itself; stay alive to clean up.
    ctrlc::set_handler(|| debug!("Interrupt forwarded to tracked command"))
        .context("Failed to install signal handler")?;

    let result = track(config, &command)?;
    if let Some(tasks) = &result.tasks {
        println!("{}", serde_json::to_string_pretty(tasks)?);
    }
    Ok(result.exit_code)
}
