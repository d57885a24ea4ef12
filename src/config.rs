//! Tracker configuration.
//!
//! Everything the server and client need is collected here once at startup
//! and passed down explicitly.

use crate::progress::{TaskId, DEFAULT_ROOT_TITLE, ROOT_TASK_ID};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable holding the coordinator socket path.
pub const SOCKET_PATH_ENV: &str = "PTRACK_SOCKETPATH";

/// Environment variable holding the task id reporting processes default to.
pub const TASK_ID_ENV: &str = "PTRACK_TASKID";

/// Configuration shared by [`TrackerServer`](crate::daemon::TrackerServer)
/// and [`TrackerClient`](crate::client::TrackerClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Filesystem path of the Unix domain socket
    pub socket_path: PathBuf,
    /// Task used by clients when a call omits the task id
    pub default_task_id: TaskId,
    /// Remove the socket file when the server shuts down
    pub cleanup: bool,
    /// Report updates to unknown tasks as errors instead of ignoring them
    pub strict_updates: bool,
    /// Title of the root task
    pub root_title: String,
}

impl TrackerConfig {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            default_task_id: ROOT_TASK_ID,
            cleanup: false,
            strict_updates: false,
            root_title: DEFAULT_ROOT_TITLE.to_string(),
        }
    }

    /// Build a configuration from [`SOCKET_PATH_ENV`] and [`TASK_ID_ENV`].
    ///
    /// See [`TrackerConfig::from_lookup`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var_os(name))
    }

    /// Build a configuration from variables resolved by `lookup`.
    ///
    /// # Arguments
    /// * `lookup` - Resolves a variable name to its value, like `std::env::var_os`
    ///
    /// # Returns
    /// The configuration, or an error when [`SOCKET_PATH_ENV`] is unset or
    /// empty. A missing task id means the root; an unparsable one is logged
    /// and also falls back to the root.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let socket_path = lookup(SOCKET_PATH_ENV)
            .filter(|v| !v.is_empty())
            .with_context(|| format!("{SOCKET_PATH_ENV} is not set"))?;

        let mut config = Self::new(PathBuf::from(socket_path));
        if let Some(value) = lookup(TASK_ID_ENV) {
            let parsed = value
                .to_str()
                .context("value is not valid UTF-8")
                .and_then(parse_task_id);
            match parsed {
                Ok(id) => config.default_task_id = id,
                Err(e) => warn!(
                    "Invalid {TASK_ID_ENV} value {value:?}, using task {ROOT_TASK_ID}: {e:#}"
                ),
            }
        }
        Ok(config)
    }

    pub fn with_default_task_id(mut self, id: TaskId) -> Self {
        self.default_task_id = id;
        self
    }

    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_strict_updates(mut self, strict: bool) -> Self {
        self.strict_updates = strict;
        self
    }

    pub fn with_root_title(mut self, title: impl Into<String>) -> Self {
        self.root_title = title.into();
        self
    }
}

/// Parse a task id as given on the command line or in the environment.
/// An empty value means the root task.
pub fn parse_task_id(value: &str) -> Result<TaskId> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(ROOT_TASK_ID);
    }
    value
        .parse::<TaskId>()
        .with_context(|| format!("'{value}' is not a task id"))
}
