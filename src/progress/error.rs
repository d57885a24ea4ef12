use thiserror::Error;

/// Usage errors raised by the progress tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("Unknown query subject: {0}")]
    UnknownSubject(String),

    #[error("Task weight must be a positive number, got {0}")]
    InvalidWeight(f64),

    #[error("Task tree is deeper than {0} levels")]
    TreeTooDeep(usize),
}
