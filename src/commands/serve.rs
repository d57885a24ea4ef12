//! Serve command - runs the tracker in the foreground until interrupted

use crate::config::TrackerConfig;
use crate::daemon::TrackerServer;
use anyhow::{Context, Result};
use tracing::info;

/// Bind the configured socket and serve requests until SIGINT/SIGTERM.
pub fn execute(config: TrackerConfig) -> Result<()> {
    let mut server = TrackerServer::bind(config)?;

    let handle = server.shutdown_handle();
    ctrlc::set_handler(move || {
        info!("Shutdown requested");
        handle.shutdown();
    })
    .context("Failed to install signal handler")?;

    server.run()
}
