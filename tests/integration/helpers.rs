//! Test helper functions for integration tests

use anyhow::Result;
use ptrack::client::TrackerClient;
use ptrack::config::TrackerConfig;
use ptrack::daemon::{ShutdownHandle, TrackerServer};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use tempfile::TempDir;

/// A tracker running on a background thread.
///
/// The temporary directory holding the socket lives as long as the
/// fixture; dropping the fixture stops the server.
pub struct TrackerFixture {
    pub config: TrackerConfig,
    handle: ShutdownHandle,
    join: Option<JoinHandle<Result<()>>>,
    _temp_dir: TempDir,
}

impl TrackerFixture {
    pub fn start() -> Self {
        Self::start_with(|config| config)
    }

    pub fn start_with(configure: impl FnOnce(TrackerConfig) -> TrackerConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = configure(TrackerConfig::new(temp_dir.path().join("ptrack.sock")));

        let mut server = TrackerServer::bind(config.clone()).expect("Failed to bind tracker");
        let handle = server.shutdown_handle();
        let join = thread::spawn(move || server.run());

        Self {
            config,
            handle,
            join: Some(join),
            _temp_dir: temp_dir,
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.config.socket_path.clone()
    }

    pub fn client(&self) -> TrackerClient {
        let client = TrackerClient::connect(&self.config);
        assert!(client.is_connected(), "client failed to connect");
        client
    }

    /// Stop the server and surface any error it returned.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.handle.shutdown();
        if let Some(join) = self.join.take() {
            join.join()
                .expect("Tracker thread panicked")
                .expect("Tracker returned an error");
        }
    }
}

impl Drop for TrackerFixture {
    fn drop(&mut self) {
        if !thread::panicking() {
            self.shutdown();
        } else {
            self.handle.shutdown();
        }
    }
}

/// Compare floats produced by weighted aggregation.
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-12,
        "expected {expected}, got {actual}"
    );
}
