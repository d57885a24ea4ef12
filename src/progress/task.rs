//! A single node of the progress tree.

use serde_json::Value;

/// Identifier of a task: its index in the tree's arena.
pub type TaskId = usize;

/// Weight given to a task when the declaring process does not supply one.
pub const DEFAULT_WEIGHT: f64 = 10.0;

/// One unit of trackable work.
///
/// Tasks live in the arena owned by [`ProgressState`](super::ProgressState);
/// `parent` and `children` are indices into that arena.
#[derive(Debug, Clone)]
pub struct Task {
    pub(super) id: TaskId,
    pub(super) parent: Option<TaskId>,
    pub(super) weight: f64,
    pub(super) children: Vec<TaskId>,
    pub(super) children_weight: f64,
    pub(super) progress: f64,
    pub(super) message: String,
    pub(super) code: Value,
    pub(super) title: Option<String>,
}

impl Task {
    pub(super) fn new(
        id: TaskId,
        parent: Option<TaskId>,
        weight: f64,
        title: Option<String>,
    ) -> Self {
        Self {
            id,
            parent,
            weight,
            children: Vec::new(),
            children_weight: 0.0,
            progress: 0.0,
            message: String::new(),
            code: Value::Null,
            title,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn children(&self) -> &[TaskId] {
        &self.children
    }

    pub fn children_weight(&self) -> f64 {
        self.children_weight
    }

    /// Last stored progress value. For tasks with children this is the
    /// cached aggregate and may lag behind the children.
    pub fn stored_progress(&self) -> f64 {
        self.progress
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> &Value {
        &self.code
    }

    /// Title as shown to monitors, synthesized from the id when absent.
    pub fn title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => format!("Task#{}", self.id),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.progress == 1.0
    }

    pub(super) fn attach_child(&mut self, child: TaskId, weight: f64) {
        self.children.push(child);
        self.children_weight += weight;
    }

    /// Monotonic-max: only strictly larger values up to 1.0 are kept.
    pub(super) fn raise_progress(&mut self, p: f64) {
        if self.progress < p && p <= 1.0 {
            self.progress = p;
        }
    }
}
