//! Server lifecycle: binding the socket and cleaning it up.

use super::core::TrackerServer;
use crate::config::TrackerConfig;
use anyhow::{bail, Context, Result};
use std::fs;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use tracing::{debug, info, warn};

impl TrackerServer {
    /// Bind the listening socket described by `config`.
    ///
    /// A leftover socket file that nobody answers on is replaced; a socket
    /// with a live server behind it is an error.
    ///
    /// # Arguments
    /// * `config` - Socket path, root title and update policy of the tracker
    ///
    /// # Returns
    /// A `TrackerServer` with a non-blocking listener, ready for [`TrackerServer::run`]
    pub fn bind(config: TrackerConfig) -> Result<Self> {
        let path = config.socket_path.clone();
        remove_stale_socket(&path)?;

        let listener = UnixListener::bind(&path)
            .with_context(|| format!("Failed to bind Unix socket {}", path.display()))?;
        listener
            .set_nonblocking(true)
            .context("Failed to set socket to non-blocking")?;

        info!(socket = %path.display(), "Tracker socket bound");
        Ok(Self::from_listener(config, listener))
    }

    /// Remove the socket file if cleanup was requested.
    pub(super) fn cleanup(&self) -> Result<()> {
        if !self.config.cleanup {
            return Ok(());
        }
        // Ignore NotFound to avoid TOCTOU race
        if let Err(e) = fs::remove_file(&self.config.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e).context("Failed to remove socket file");
            }
        }
        debug!(
            socket = %self.config.socket_path.display(),
            "Cleaned up socket file"
        );
        Ok(())
    }
}

impl Drop for TrackerServer {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            warn!("{e:#}");
        }
    }
}

fn remove_stale_socket(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }
    if UnixStream::connect(path).is_ok() {
        bail!("Socket {} is already served by another tracker", path.display());
    }

    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            return Err(e).context("Failed to remove stale socket file");
        }
    }
    debug!(socket = %path.display(), "Removed stale socket file");
    Ok(())
}
