//! Serializable views of the progress tree.

use super::task::TaskId;
use super::TrackerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// What a monitor asks for with a QUERY request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySubject {
    /// Root task plus the most recently updated task, without children
    Progress,
    /// Whole tree, recursively
    Tasks,
}

impl FromStr for QuerySubject {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "progress" => Ok(Self::Progress),
            "tasks" => Ok(Self::Tasks),
            other => Err(TrackerError::UnknownSubject(other.to_string())),
        }
    }
}

impl fmt::Display for QuerySubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress => write!(f, "progress"),
            Self::Tasks => write!(f, "tasks"),
        }
    }
}

/// Point-in-time copy of one task.
///
/// `children` is always fully materialized; it is empty for non-recursive
/// snapshots. `last` is only present on the root of a progress query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub title: String,
    pub message: String,
    pub progress: f64,
    pub code: Value,
    pub children: Vec<TaskSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<Box<TaskSnapshot>>,
}

impl TaskSnapshot {
    /// Number of tasks in this snapshot, including itself.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Depth-first search for a task by id.
    pub fn find(&self, id: TaskId) -> Option<&TaskSnapshot> {
        self.iter().find(|snapshot| snapshot.id == id)
    }

    /// Pre-order walk over this snapshot and its descendants.
    pub fn iter(&self) -> impl Iterator<Item = &TaskSnapshot> + '_ {
        let mut pending = vec![self];
        std::iter::from_fn(move || {
            let next = pending.pop()?;
            pending.extend(next.children.iter().rev());
            Some(next)
        })
    }
}
