use super::task::{GraphPolicy, TaskError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Task configuration error: {source}")]
    Task {
        #[from]
        source: TaskError,
    },

    #[error("Task covers {task_len} positions but the pose has {pose_len}")]
    TaskMismatch { task_len: usize, pose_len: usize },

    #[error(
        "Position {position} is packable but its legal rotamer set is empty; \
         fix the task flags or the rotamer library for this position"
    )]
    EmptyRotamerSet { position: usize },

    #[error(
        "Pairwise storage for positions {positions:?} under the {policy} policy \
         needs {requested_bytes} bytes against a limit of {limit_bytes}"
    )]
    MemoryBudget {
        policy: GraphPolicy,
        positions: (usize, usize),
        requested_bytes: u64,
        limit_bytes: u64,
    },

    #[error("Failed to build the graph worker pool: {0}")]
    WorkerPool(String),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
