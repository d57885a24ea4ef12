//! Client commands - report progress to, or query, a running tracker

use crate::client::TrackerClient;
use crate::config::TrackerConfig;
use crate::progress::{QuerySubject, TaskId};
use anyhow::Result;
use serde_json::Value;

/// One client request as given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Declare {
        title: String,
        parent: Option<TaskId>,
        weight: f64,
    },
    Progress {
        task: Option<TaskId>,
        progress: f64,
        message: Option<String>,
        code: Option<String>,
    },
    Done {
        task: Option<TaskId>,
        message: Option<String>,
        code: Option<String>,
    },
    Query {
        subject: QuerySubject,
    },
}

/// Send `report` to the tracker and print the result.
///
/// Returns `false` when the tracker is unreachable or rejected the request.
pub fn execute(config: &TrackerConfig, report: Report) -> Result<bool> {
    let mut client = TrackerClient::connect(config);
    if !client.is_connected() {
        eprintln!(
            "Not connected to a tracker at {}",
            config.socket_path.display()
        );
        return Ok(false);
    }

    match perform(&mut client, report)? {
        Some(output) => {
            println!("{output}");
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Send `report` and render the reply, `None` when there is none.
pub fn perform(client: &mut TrackerClient, report: Report) -> Result<Option<String>> {
    let output = match report {
        Report::Declare {
            title,
            parent,
            weight,
        } => client
            .declare_task(&title, parent, weight)
            .map(|id| id.to_string()),
        Report::Progress {
            task,
            progress,
            message,
            code,
        } => client
            .set_task_progress(task, progress, message.as_deref(), code.map(parse_code))
            .map(|id| id.to_string()),
        Report::Done {
            task,
            message,
            code,
        } => client
            .set_task_done(task, message.as_deref(), code.map(parse_code))
            .map(|id| id.to_string()),
        Report::Query { subject } => match client.query(subject) {
            Some(snapshot) => Some(serde_json::to_string_pretty(&snapshot)?),
            None => None,
        },
    };
    Ok(output)
}

/// Codes are JSON when they parse as JSON, plain strings otherwise.
pub fn parse_code(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}
