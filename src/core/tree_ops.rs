//! Structural edits: reparenting and sibling reordering, including the two
//! drag-and-drop compositions and keyboard nudging.
//!
//! Moves do not check for cycles themselves. Callers must run
//! [`TaskService::validate_move`] first; it is the single cycle guard shared by
//! every entry point.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::core::propagation;
use crate::core::task_service::TaskService;
use crate::db::task_repo;
use crate::error::{ActError, Result};
use crate::id::TaskId;
use crate::types::Task;
use crate::view;

impl<'a> TaskService<'a> {
    /// Reject a move that would place a task under itself or one of its
    /// descendants. Moving to the root is always allowed.
    pub fn validate_move(&self, ids: &[TaskId], new_parent_id: Option<&TaskId>) -> Result<()> {
        let Some(new_parent_id) = new_parent_id else {
            return Ok(());
        };
        let tasks = task_repo::list_all(self.conn)?;
        for id in ids {
            if !view::can_move_under(&tasks, id, new_parent_id) {
                return Err(ActError::InvalidHierarchy {
                    task_id: id.clone(),
                    new_parent_id: new_parent_id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Append `ids`, in the given order, to the end of `new_parent_id`'s group.
    ///
    /// Precondition: [`validate_move`](Self::validate_move) accepted the move.
    /// A parent id that no longer exists resolves to the root group. Returns
    /// the ids that were actually moved.
    pub fn move_to_parent(
        &self,
        ids: &[TaskId],
        new_parent_id: Option<&TaskId>,
    ) -> Result<Vec<TaskId>> {
        self.move_to_parent_at(ids, new_parent_id, Utc::now())
    }

    pub fn move_to_parent_at(
        &self,
        ids: &[TaskId],
        new_parent_id: Option<&TaskId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskId>> {
        self.in_transaction(|conn| {
            let parent_id = existing_parent(conn, new_parent_id)?;
            move_in(conn, ids, parent_id.as_ref(), &now)
        })
    }

    /// Rewrite a group's order to match `ordered_ids`. Members the caller left
    /// out keep their relative order after the listed ones; ids from other
    /// groups are ignored.
    pub fn reorder(&self, ordered_ids: &[TaskId], parent_id: Option<&TaskId>) -> Result<()> {
        self.in_transaction(|conn| reorder_in(conn, ordered_ids, parent_id))
    }

    /// Same-column drag: lift `dragged_ids` out of the group and drop them, as
    /// a block in their current relative order, at `drop_index` among the
    /// remaining siblings.
    pub fn reorder_within(
        &self,
        parent_id: Option<&TaskId>,
        dragged_ids: &[TaskId],
        drop_index: usize,
    ) -> Result<()> {
        self.in_transaction(|conn| {
            let group = task_repo::get_children(conn, parent_id)?;
            let (dragged, rest): (Vec<Task>, Vec<Task>) =
                group.into_iter().partition(|t| dragged_ids.contains(&t.id));
            let dragged: Vec<TaskId> = dragged.into_iter().map(|t| t.id).collect();
            let rest: Vec<TaskId> = rest.into_iter().map(|t| t.id).collect();

            let ordered = splice_at(rest, dragged, drop_index);
            reorder_in(conn, &ordered, parent_id)
        })
    }

    /// Cross-column drag: reparent `ids` under `new_parent_id`, then place them
    /// at `drop_index` of the destination list as it looked before the move.
    pub fn move_to_position(
        &self,
        ids: &[TaskId],
        new_parent_id: Option<&TaskId>,
        drop_index: usize,
    ) -> Result<Vec<TaskId>> {
        self.move_to_position_at(ids, new_parent_id, drop_index, Utc::now())
    }

    pub fn move_to_position_at(
        &self,
        ids: &[TaskId],
        new_parent_id: Option<&TaskId>,
        drop_index: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskId>> {
        self.in_transaction(|conn| {
            let parent_id = existing_parent(conn, new_parent_id)?;
            let new_parent_id = parent_id.as_ref();

            // Capture before the move mutates the destination group
            let destination: Vec<TaskId> = task_repo::get_children(conn, new_parent_id)?
                .into_iter()
                .map(|t| t.id)
                .filter(|id| !ids.contains(id))
                .collect();

            let moved = move_in(conn, ids, new_parent_id, &now)?;
            let ordered = splice_at(destination, moved.clone(), drop_index);
            reorder_in(conn, &ordered, new_parent_id)?;
            Ok(moved)
        })
    }

    /// Keyboard nudge: move a task `delta` places within its group, clamped to
    /// the group bounds.
    pub fn shift(&self, id: &TaskId, delta: i64) -> Result<Option<Task>> {
        self.in_transaction(|conn| {
            let Some(task) = task_repo::get_task(conn, id)? else {
                return Ok(None);
            };
            let mut group: Vec<TaskId> = task_repo::get_children(conn, task.parent_id.as_ref())?
                .into_iter()
                .map(|t| t.id)
                .collect();
            let Some(from) = group.iter().position(|g| g == id) else {
                return Ok(Some(task));
            };
            let last = group.len() as i64 - 1;
            let to = (from as i64 + delta).clamp(0, last) as usize;
            if to != from {
                let moved = group.remove(from);
                group.insert(to, moved);
                reorder_in(conn, &group, task.parent_id.as_ref())?;
            }
            task_repo::get_task(conn, id)
        })
    }
}

/// The destination group for a move: the parent itself when it exists, the
/// root group otherwise.
fn existing_parent(conn: &Connection, parent_id: Option<&TaskId>) -> Result<Option<TaskId>> {
    match parent_id {
        Some(pid) if task_repo::task_exists(conn, pid)? => Ok(Some(pid.clone())),
        Some(pid) => {
            warn!(parent_id = %pid, "move target not found, moving to root");
            Ok(None)
        }
        None => Ok(None),
    }
}

fn move_in(
    conn: &Connection,
    ids: &[TaskId],
    new_parent_id: Option<&TaskId>,
    now: &DateTime<Utc>,
) -> Result<Vec<TaskId>> {
    let mut next = task_repo::next_order(conn, new_parent_id)?;
    let mut moved: Vec<TaskId> = Vec::new();
    let mut sources: Vec<Option<TaskId>> = Vec::new();

    for id in ids {
        if moved.contains(id) {
            continue;
        }
        let Some(task) = task_repo::get_task(conn, id)? else {
            continue;
        };
        if task.parent_id.as_ref() != new_parent_id && !sources.contains(&task.parent_id) {
            sources.push(task.parent_id.clone());
        }
        task_repo::set_parent(conn, &task.id, new_parent_id, next)?;
        next += 1;
        moved.push(task.id);
    }

    for source in &sources {
        task_repo::renumber_group(conn, source.as_ref())?;
        if let Some(parent_id) = source {
            propagation::update_parent_completion_status(conn, parent_id, now)?;
        }
    }

    task_repo::renumber_group(conn, new_parent_id)?;
    if let Some(parent_id) = new_parent_id {
        propagation::update_parent_completion_status(conn, parent_id, now)?;
    }

    info!(count = moved.len(), parent_id = ?new_parent_id.map(|p| p.as_str()), "moved tasks");
    Ok(moved)
}

fn reorder_in(conn: &Connection, ordered_ids: &[TaskId], parent_id: Option<&TaskId>) -> Result<()> {
    let group = task_repo::get_children(conn, parent_id)?;
    let mut placed: Vec<&TaskId> = Vec::with_capacity(group.len());

    for id in ordered_ids {
        if placed.contains(&id) {
            continue;
        }
        if group.iter().any(|t| &t.id == id) {
            placed.push(id);
        } else {
            debug!(task_id = %id, "reorder ignored id outside the group");
        }
    }
    for task in &group {
        if !placed.contains(&&task.id) {
            placed.push(&task.id);
        }
    }

    for (index, id) in placed.iter().enumerate() {
        let index = index as i64;
        if group.iter().any(|t| &t.id == *id && t.order != index) {
            task_repo::set_order(conn, id, index)?;
        }
    }
    Ok(())
}

/// Insert `block` into `list` at `index`, clamped to the end.
fn splice_at(mut list: Vec<TaskId>, block: Vec<TaskId>, index: usize) -> Vec<TaskId> {
    let index = index.min(list.len());
    list.splice(index..index, block);
    list
}
