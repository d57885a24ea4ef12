//! Blocking client used by reporting processes and monitors.
//!
//! Each call sends one request frame and waits for its response. A tracker
//! that cannot be reached is not an error: the client reports itself as not
//! connected and every call returns `None`, so instrumented programs keep
//! working when nobody is tracking them.

use crate::config::TrackerConfig;
use crate::daemon::protocol::{read_frame, write_frame, Frame, Operation};
use crate::progress::{QuerySubject, TaskId, TaskSnapshot, ROOT_TASK_ID};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::os::unix::net::UnixStream;
use tracing::{debug, warn};

/// Weight the client declares tasks with when the caller has no preference.
pub const CLIENT_DEFAULT_WEIGHT: f64 = 1.0;

pub struct TrackerClient {
    stream: Option<UnixStream>,
    default_task_id: TaskId,
}

impl TrackerClient {
    /// Connect to the tracker named in `config`.
    pub fn connect(config: &TrackerConfig) -> Self {
        let stream = match UnixStream::connect(&config.socket_path) {
            Ok(stream) => Some(stream),
            Err(e) => {
                debug!(
                    socket = %config.socket_path.display(),
                    "Tracker not reachable: {e}"
                );
                None
            }
        };
        Self {
            stream,
            default_task_id: config.default_task_id,
        }
    }

    /// Connect using `PTRACK_SOCKETPATH` / `PTRACK_TASKID`.
    ///
    /// A missing socket path yields a disconnected client. An unparsable
    /// task id is logged and the root task becomes the default.
    pub fn from_env() -> Self {
        match TrackerConfig::from_env() {
            Ok(config) => Self::connect(&config),
            Err(e) => {
                debug!("No tracker configured: {e:#}");
                Self {
                    stream: None,
                    default_task_id: ROOT_TASK_ID,
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn default_task_id(&self) -> TaskId {
        self.default_task_id
    }

    /// Declare a task under `parent`, or under the default task when omitted.
    pub fn declare_task(
        &mut self,
        title: &str,
        parent: Option<TaskId>,
        weight: f64,
    ) -> Option<TaskId> {
        let parent = parent.unwrap_or(self.default_task_id);
        self.send(Operation::Declare, &(parent, weight, title))
    }

    pub fn set_task_progress(
        &mut self,
        task_id: Option<TaskId>,
        progress: f64,
        message: Option<&str>,
        code: Option<Value>,
    ) -> Option<TaskId> {
        let task_id = task_id.unwrap_or(self.default_task_id);
        self.send(Operation::Progress, &(task_id, progress, message, code))
    }

    pub fn set_task_done(
        &mut self,
        task_id: Option<TaskId>,
        message: Option<&str>,
        code: Option<Value>,
    ) -> Option<TaskId> {
        let task_id = task_id.unwrap_or(self.default_task_id);
        self.send(Operation::Done, &(task_id, message, code))
    }

    pub fn query(&mut self, subject: QuerySubject) -> Option<TaskSnapshot> {
        self.send(Operation::Query, &[subject.to_string()])
    }

    /// Root progress plus the last updated task.
    pub fn get_progress(&mut self) -> Option<TaskSnapshot> {
        self.query(QuerySubject::Progress)
    }

    fn send<A, T>(&mut self, operation: Operation, args: &A) -> Option<T>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let stream = self.stream.as_mut()?;

        let result = Frame::from_json(operation.code(), args).and_then(|request| {
            write_frame(stream, &request)?;
            read_frame(stream)
        });

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("{operation} request failed, disconnecting: {e}");
                self.stream = None;
                return None;
            }
        };

        if response.is_error() {
            let descriptor = String::from_utf8_lossy(&response.body);
            debug!("{operation} rejected by tracker: {descriptor}");
            return None;
        }

        match response.response_json::<T>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("{operation} returned an unexpected body: {e}");
                None
            }
        }
    }
}
