//! Maps request frames onto progress tree operations.

use super::protocol::{response_code, Frame, Operation, ProtocolError};
use crate::progress::{
    ProgressState, QuerySubject, TaskId, TaskSnapshot, TrackerError, UpdateOutcome,
    DEFAULT_WEIGHT, ROOT_TASK_ID,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Bad positional arguments in a request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgumentError {
    #[error("{operation} takes at most {max} arguments ({given} given)")]
    TooMany {
        operation: Operation,
        max: usize,
        given: usize,
    },

    #[error("{operation} requires argument '{name}'")]
    Missing {
        operation: Operation,
        name: &'static str,
    },

    #[error("Invalid value for '{name}': expected {expected}, got {value}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: Value,
    },
}

/// Any failure that turns a request into an ERROR response.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Arguments(#[from] ArgumentError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),
}

/// Successful result of one operation, serialized as the response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    TaskId(TaskId),
    Snapshot(TaskSnapshot),
}

/// Owns the progress tree and applies requests to it.
#[derive(Debug)]
pub struct Dispatcher {
    state: ProgressState,
    strict_updates: bool,
}

impl Dispatcher {
    /// `strict_updates` turns updates to unknown tasks into ERROR responses
    /// instead of silently acknowledging them.
    pub fn new(state: ProgressState, strict_updates: bool) -> Self {
        Self {
            state,
            strict_updates,
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ProgressState {
        &mut self.state
    }

    /// Handle one request frame and build its response frame.
    pub fn dispatch(&mut self, request: &Frame) -> Frame {
        debug!(
            "> Request 0x{:02x} > {}",
            request.code,
            String::from_utf8_lossy(&request.body)
        );

        let result = self
            .invoke(request)
            .and_then(|reply| Ok(Frame::from_json(response_code(request.code, false), &reply)?));

        let response = match result {
            Ok(frame) => frame,
            Err(e) => error_frame(request.code, &e),
        };

        debug!(
            "< Response 0x{:02x} < {}",
            response.code,
            String::from_utf8_lossy(&response.body)
        );
        response
    }

    /// Run the operation named by the frame code with the frame's arguments.
    pub fn invoke(&mut self, request: &Frame) -> Result<Reply, DispatchError> {
        let operation = Operation::try_from(request.code)?;
        let body: Value = request.json()?;
        let values = match body {
            Value::Null => Vec::new(),
            Value::Array(values) => values,
            _ => return Err(ProtocolError::ArgumentsNotArray.into()),
        };

        match operation {
            Operation::Declare => {
                let args = Args::new(operation, &values, 3)?;
                let parent = args.task_id(0, "parent_id")?.unwrap_or(ROOT_TASK_ID);
                let weight = args.number(1, "weight")?.unwrap_or(DEFAULT_WEIGHT);
                let title = args.text(2);
                let id = self.state.declare_task(parent, weight, title)?;
                Ok(Reply::TaskId(id))
            }
            Operation::Done => {
                let args = Args::new(operation, &values, 3)?;
                let id = args.required_task_id(0, "task_id")?;
                let outcome = self.state.set_task_done(id, args.text(1), args.code(2));
                self.finish_update(outcome)
            }
            Operation::Query => {
                let args = Args::new(operation, &values, 1)?;
                let subject = match args.value(0) {
                    None => QuerySubject::Progress,
                    Some(Value::String(s)) => s.parse()?,
                    Some(other) => return Err(invalid("subject", "a string", other).into()),
                };
                Ok(Reply::Snapshot(self.state.query(subject)?))
            }
            Operation::Progress => {
                let args = Args::new(operation, &values, 4)?;
                let id = args.required_task_id(0, "task_id")?;
                let progress = args.number(1, "progress")?.unwrap_or(0.0);
                let outcome =
                    self.state
                        .set_task_progress(id, progress, args.text(2), args.code(3));
                self.finish_update(outcome)
            }
        }
    }

    fn finish_update(&self, outcome: UpdateOutcome) -> Result<Reply, DispatchError> {
        match outcome {
            UpdateOutcome::Applied(id) => Ok(Reply::TaskId(id)),
            UpdateOutcome::NotFound(id) if self.strict_updates => {
                Err(DispatchError::TaskNotFound(id))
            }
            UpdateOutcome::NotFound(id) => {
                warn!(task_id = id, "Ignoring update for unknown task");
                Ok(Reply::TaskId(id))
            }
        }
    }
}

/// Response carrying `[message]` as its error descriptor.
fn error_frame(request_code: u8, err: &DispatchError) -> Frame {
    warn!("Request 0x{request_code:02x} failed: {err}");

    let code = response_code(request_code, true);
    let descriptor = [err.to_string()];
    Frame::from_json(code, &descriptor).unwrap_or_else(|_| {
        let fallback = ["Error description too large".to_string()];
        Frame::from_json(code, &fallback).unwrap_or_else(|_| Frame::new(code, b"[]".to_vec()))
    })
}

fn invalid(name: &'static str, expected: &'static str, value: &Value) -> ArgumentError {
    ArgumentError::Invalid {
        name,
        expected,
        value: value.clone(),
    }
}

/// Positional arguments of one request. A JSON `null` counts as omitted.
struct Args<'a> {
    operation: Operation,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    fn new(operation: Operation, values: &'a [Value], max: usize) -> Result<Self, ArgumentError> {
        if values.len() > max {
            return Err(ArgumentError::TooMany {
                operation,
                max,
                given: values.len(),
            });
        }
        Ok(Self { operation, values })
    }

    fn value(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index).filter(|v| !v.is_null())
    }

    /// Ids arrive as integers or as decimal strings (clients forward ids
    /// taken from their environment verbatim).
    fn task_id(&self, index: usize, name: &'static str) -> Result<Option<TaskId>, ArgumentError> {
        let Some(value) = self.value(index) else {
            return Ok(None);
        };
        let id = match value {
            Value::Number(n) => n.as_u64().and_then(|n| TaskId::try_from(n).ok()),
            Value::String(s) => s.trim().parse::<TaskId>().ok(),
            _ => None,
        };
        id.map(Some)
            .ok_or_else(|| invalid(name, "a non-negative task id", value))
    }

    fn required_task_id(&self, index: usize, name: &'static str) -> Result<TaskId, ArgumentError> {
        self.task_id(index, name)?.ok_or(ArgumentError::Missing {
            operation: self.operation,
            name,
        })
    }

    fn number(&self, index: usize, name: &'static str) -> Result<Option<f64>, ArgumentError> {
        let Some(value) = self.value(index) else {
            return Ok(None);
        };
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        number
            .map(Some)
            .ok_or_else(|| invalid(name, "a number", value))
    }

    /// Free-form text; non-string values are kept as their JSON text.
    fn text(&self, index: usize) -> Option<String> {
        self.value(index).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    fn code(&self, index: usize) -> Option<Value> {
        self.value(index).cloned()
    }
}
