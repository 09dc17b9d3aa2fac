use thiserror::Error;

use crate::id::TaskId;

#[derive(Error, Debug)]
pub enum ActError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Moving `task_id` under `new_parent_id` would make it its own ancestor
    #[error("Cannot move {task_id} under {new_parent_id}: target is the task itself or one of its descendants")]
    InvalidHierarchy {
        task_id: TaskId,
        new_parent_id: TaskId,
    },

    #[error("Task name cannot be empty")]
    EmptyName,

    #[error("Invalid date: {0} (expected YYYY-MM-DD, today, tomorrow or yesterday)")]
    InvalidDate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ActError>;
