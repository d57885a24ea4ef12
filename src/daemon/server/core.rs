//! Core TrackerServer struct and accessors.

use super::connection::Connection;
use crate::config::TrackerConfig;
use crate::daemon::dispatch::Dispatcher;
use crate::progress::ProgressState;
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// How long one reactor iteration waits for readiness before re-checking
/// the shutdown flag.
pub(super) const POLL_TIMEOUT_MS: u16 = 100;

/// Coordinator serving the progress tree on a Unix domain socket.
pub struct TrackerServer {
    pub(super) config: TrackerConfig,
    pub(super) listener: UnixListener,
    pub(super) dispatcher: Dispatcher,
    pub(super) connections: Vec<Connection>,
    pub(super) next_connection_id: u64,
    pub(super) shutdown_flag: Arc<AtomicBool>,
}

/// Stops a running [`TrackerServer`] from another thread or a signal handler.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl TrackerServer {
    pub(super) fn from_listener(config: TrackerConfig, listener: UnixListener) -> Self {
        let state = ProgressState::new(&config.root_title);
        let dispatcher = Dispatcher::new(state, config.strict_updates);
        Self {
            config,
            listener,
            dispatcher,
            connections: Vec::new(),
            next_connection_id: 0,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Progress tree as seen by the reactor.
    pub fn state(&self) -> &ProgressState {
        self.dispatcher.state()
    }

    /// Number of currently open client connections.
    ///
    /// # Returns
    /// Connections accepted and not yet closed by either side
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Handle for stopping the server from another thread.
    ///
    /// # Returns
    /// A `ShutdownHandle` sharing this server's shutdown flag
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown_flag),
        }
    }

    /// Request the reactor loop to stop after its current iteration.
    pub fn shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::Relaxed);
    }
}
