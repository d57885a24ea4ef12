//! In-memory progress tree.
//!
//! Tasks form a weighted tree rooted at task 0. Each task reports its own
//! completion fraction; a task with children derives its progress from the
//! weighted average of theirs, computed lazily when read.
//!
//! ```text
//! root (0)
//! ├── a (w=1) ── aa, ab, ac
//! ├── b (w=1)
//! └── c (w=1) ── ca, cb
//! ```
//!
//! Progress never goes backwards, and a task that reached 1.0 is frozen.

mod error;
mod snapshot;
mod state;
mod task;


pub use error::TrackerError;
pub use snapshot::{QuerySubject, TaskSnapshot};
pub use state::{
    ProgressState, UpdateOutcome, DEFAULT_ROOT_TITLE, MAX_SNAPSHOT_DEPTH, ROOT_TASK_ID,
};
pub use task::{Task, TaskId, DEFAULT_WEIGHT};
