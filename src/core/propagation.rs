//! Bottom-up completion propagation.
//!
//! A task with children is complete exactly when all of its direct children
//! are. A childless task's flag belongs to the user. Propagation walks the
//! ancestor chain one level at a time and stops at the first ancestor whose
//! flag already agrees with its children, since nothing above it can change.
//!
//! The walk terminates because `parent_id` chains form a forest; callers of
//! move operations are responsible for never introducing a cycle.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

use crate::db::task_repo;
use crate::error::Result;
use crate::id::TaskId;

/// Re-evaluate ancestors after `task_id` itself changed (toggle, create).
pub fn propagate(conn: &Connection, task_id: &TaskId, now: &DateTime<Utc>) -> Result<()> {
    let Some(task) = task_repo::get_task(conn, task_id)? else {
        return Ok(());
    };
    match task.parent_id {
        Some(parent_id) => update_parent_completion_status(conn, &parent_id, now),
        None => Ok(()),
    }
}

/// Re-evaluate `parent_id` after its set of children changed (delete, move).
/// A parent left with no children keeps whatever flag it had.
pub fn update_parent_completion_status(
    conn: &Connection,
    parent_id: &TaskId,
    now: &DateTime<Utc>,
) -> Result<()> {
    let mut current = Some(parent_id.clone());

    while let Some(parent_id) = current.take() {
        let Some(parent) = task_repo::get_task(conn, &parent_id)? else {
            break;
        };
        let children = task_repo::get_children(conn, Some(&parent_id))?;
        if children.is_empty() {
            break;
        }

        let all_complete = children.iter().all(|c| c.completed);
        if parent.completed == all_complete {
            break;
        }

        task_repo::set_completed(conn, &parent_id, all_complete, now)?;
        debug!(task_id = %parent_id, completed = all_complete, "propagated completion");
        current = parent.parent_id;
    }

    Ok(())
}
