//! The task arena and its aggregation logic.

use super::snapshot::{QuerySubject, TaskSnapshot};
use super::task::{Task, TaskId, DEFAULT_WEIGHT};
use super::TrackerError;
use serde_json::Value;

/// Title given to the root task when none is configured.
pub const DEFAULT_ROOT_TITLE: &str = "Root task";

/// Id of the implicit root task.
pub const ROOT_TASK_ID: TaskId = 0;

/// Deepest `tasks` snapshot the tracker will build, root level included.
/// Anything deeper could not fit in a single response frame anyway.
pub const MAX_SNAPSHOT_DEPTH: usize = 512;

/// Result of an update operation on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The task exists and the update rules were applied
    Applied(TaskId),
    /// No task with this id; nothing changed
    NotFound(TaskId),
}

impl UpdateOutcome {
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::Applied(id) | Self::NotFound(id) => *id,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Weighted tree of tasks rooted at [`ROOT_TASK_ID`].
///
/// Progress is pulled: parents are recomputed from their children when
/// read, never pushed on child updates.
#[derive(Debug, Clone)]
pub struct ProgressState {
    tasks: Vec<Task>,
    last_task_id: TaskId,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_TITLE)
    }
}

impl ProgressState {
    /// Create a tree holding only the root task.
    pub fn new(root_title: &str) -> Self {
        Self {
            tasks: vec![Task::new(
                ROOT_TASK_ID,
                None,
                DEFAULT_WEIGHT,
                Some(root_title.to_string()),
            )],
            last_task_id: ROOT_TASK_ID,
        }
    }

    /// Number of tasks, root included.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Always false: the root cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Id of the task touched by the most recent successful update.
    pub fn last_updated(&self) -> TaskId {
        self.last_task_id
    }

    /// Declare a new task under `parent_id`.
    ///
    /// An unknown parent is not an error: the task is attached to the root.
    pub fn declare_task(
        &mut self,
        parent_id: TaskId,
        weight: f64,
        title: Option<String>,
    ) -> Result<TaskId, TrackerError> {
        if !(weight.is_finite() && weight > 0.0) {
            return Err(TrackerError::InvalidWeight(weight));
        }

        let parent = if parent_id < self.tasks.len() {
            parent_id
        } else {
            ROOT_TASK_ID
        };
        let id = self.tasks.len();

        self.tasks[parent].attach_child(id, weight);
        self.tasks.push(Task::new(id, Some(parent), weight, title));

        Ok(id)
    }

    /// Raise a task's own progress and optionally replace its message/code.
    pub fn set_task_progress(
        &mut self,
        id: TaskId,
        progress: f64,
        message: Option<String>,
        code: Option<Value>,
    ) -> UpdateOutcome {
        let Some(task) = self.tasks.get_mut(id) else {
            return UpdateOutcome::NotFound(id);
        };

        task.raise_progress(progress);
        if let Some(message) = message {
            task.message = message;
        }
        if let Some(code) = code {
            task.code = code;
        }
        self.last_task_id = id;

        UpdateOutcome::Applied(id)
    }

    /// Mark a task complete.
    pub fn set_task_done(
        &mut self,
        id: TaskId,
        message: Option<String>,
        code: Option<Value>,
    ) -> UpdateOutcome {
        self.set_task_progress(id, 1.0, message, code)
    }

    /// Effective progress of a task, recomputing the weighted aggregate of
    /// its children unless the task is already terminal.
    pub fn get_progress(&mut self, id: TaskId) -> Option<f64> {
        self.tasks.get(id)?;
        self.refresh(id, false);
        Some(self.tasks[id].progress)
    }

    /// Build the snapshot a monitor asked for.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::TreeTooDeep`] when a `tasks` snapshot would
    /// nest more than [`MAX_SNAPSHOT_DEPTH`] levels.
    pub fn query(&mut self, subject: QuerySubject) -> Result<TaskSnapshot, TrackerError> {
        match subject {
            QuerySubject::Progress => {
                self.refresh(ROOT_TASK_ID, false);
                self.refresh(self.last_task_id, false);
                let mut root = self.task_snapshot(ROOT_TASK_ID, Vec::new());
                root.last = Some(Box::new(self.task_snapshot(self.last_task_id, Vec::new())));
                Ok(root)
            }
            QuerySubject::Tasks => {
                self.refresh(ROOT_TASK_ID, true);
                self.snapshot_tree(ROOT_TASK_ID)
            }
        }
    }

    /// String-subject convenience over [`ProgressState::query`].
    pub fn query_subject(&mut self, subject: &str) -> Result<TaskSnapshot, TrackerError> {
        self.query(subject.parse()?)
    }

    /// Recompute cached aggregates below `id`, children before parents.
    ///
    /// Terminal tasks keep their value. With `through_terminal` the walk
    /// still descends into them so every node of the subtree is current.
    fn refresh(&mut self, id: TaskId, through_terminal: bool) {
        let mut pending = vec![(id, false)];

        while let Some((id, expanded)) = pending.pop() {
            let task = &self.tasks[id];
            if task.children.is_empty() {
                continue;
            }

            if !expanded {
                if task.is_terminal() && !through_terminal {
                    continue;
                }
                pending.push((id, true));
                pending.extend(task.children.iter().map(|&child| (child, false)));
                continue;
            }

            if task.is_terminal() {
                continue;
            }
            let aggregate: f64 = task
                .children
                .iter()
                .map(|&child| {
                    let child = &self.tasks[child];
                    child.progress * (child.weight / task.children_weight)
                })
                .sum();
            self.tasks[id].raise_progress(aggregate);
        }
    }

    /// Nested snapshot of the subtree at `root` from the cached progress.
    fn snapshot_tree(&self, root: TaskId) -> Result<TaskSnapshot, TrackerError> {
        let mut ancestors: Vec<(TaskId, Vec<TaskSnapshot>)> = Vec::new();
        let (mut id, mut children) = (root, Vec::new());

        loop {
            if let Some(&child) = self.tasks[id].children.get(children.len()) {
                if ancestors.len() + 2 > MAX_SNAPSHOT_DEPTH {
                    return Err(TrackerError::TreeTooDeep(MAX_SNAPSHOT_DEPTH));
                }
                ancestors.push((id, children));
                (id, children) = (child, Vec::new());
                continue;
            }

            let snapshot = self.task_snapshot(id, children);
            match ancestors.pop() {
                Some((parent, mut siblings)) => {
                    siblings.push(snapshot);
                    (id, children) = (parent, siblings);
                }
                None => return Ok(snapshot),
            }
        }
    }

    fn task_snapshot(&self, id: TaskId, children: Vec<TaskSnapshot>) -> TaskSnapshot {
        let task = &self.tasks[id];
        TaskSnapshot {
            id,
            title: task.title(),
            message: task.message.clone(),
            progress: task.progress,
            code: task.code.clone(),
            children,
            last: None,
        }
    }
}
