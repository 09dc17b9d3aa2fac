use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::core::propagation;
use crate::db::task_repo;
use crate::error::{ActError, Result};
use crate::id::TaskId;
use crate::types::{CreateTaskInput, Task};

/// Entry point for every mutation of the task tree.
///
/// Each public operation runs in a single transaction that covers its reads,
/// writes, order renumbering and completion propagation, so a failed call
/// leaves the store exactly as it was.
pub struct TaskService<'a> {
    pub(super) conn: &'a Connection,
}

impl<'a> TaskService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub(super) fn in_transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(&*tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub fn create(&self, input: &CreateTaskInput) -> Result<Task> {
        self.create_at(input, Utc::now())
    }

    /// Create a task at the end of its sibling group. A parent id that no
    /// longer exists resolves to the root group.
    pub fn create_at(&self, input: &CreateTaskInput, now: DateTime<Utc>) -> Result<Task> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ActError::EmptyName);
        }
        let due_date = input.due_date.unwrap_or(now);

        self.in_transaction(|conn| {
            let parent_id = match &input.parent_id {
                Some(pid) if task_repo::task_exists(conn, pid)? => Some(pid.clone()),
                Some(pid) => {
                    warn!(parent_id = %pid, "parent not found, creating at root");
                    None
                }
                None => None,
            };

            let task = task_repo::insert_task(conn, name, parent_id.as_ref(), &due_date, &now)?;
            if let Some(ref pid) = parent_id {
                // A new open child reopens a completed parent
                propagation::update_parent_completion_status(conn, pid, &now)?;
            }
            info!(task_id = %task.id, order = task.order, "created task");
            Ok(task)
        })
    }

    pub fn get(&self, id: &TaskId) -> Result<Task> {
        task_repo::get_task(self.conn, id)?.ok_or_else(|| ActError::TaskNotFound(id.clone()))
    }

    /// Full reload of the task set, in sibling order.
    pub fn list_all(&self) -> Result<Vec<Task>> {
        task_repo::list_all(self.conn)
    }

    pub fn list_children(&self, parent_id: Option<&TaskId>) -> Result<Vec<Task>> {
        task_repo::get_children(self.conn, parent_id)
    }

    /// Returns `None` when the task does not exist.
    pub fn rename(&self, id: &TaskId, name: &str) -> Result<Option<Task>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ActError::EmptyName);
        }
        if !task_repo::set_name(self.conn, id, name)? {
            debug!(task_id = %id, "rename skipped, task not found");
            return Ok(None);
        }
        task_repo::get_task(self.conn, id)
    }

    pub fn toggle(&self, id: &TaskId) -> Result<Option<Task>> {
        self.toggle_at(id, Utc::now())
    }

    pub fn toggle_at(&self, id: &TaskId, now: DateTime<Utc>) -> Result<Option<Task>> {
        self.in_transaction(|conn| {
            let Some(task) = task_repo::get_task(conn, id)? else {
                return Ok(None);
            };
            apply_completion(conn, &task.id, !task.completed, &now)
        })
    }

    /// Like `toggle`, but idempotent: a task already in the requested state is
    /// returned untouched.
    pub fn set_completed(&self, id: &TaskId, completed: bool) -> Result<Option<Task>> {
        self.set_completed_at(id, completed, Utc::now())
    }

    pub fn set_completed_at(
        &self,
        id: &TaskId,
        completed: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>> {
        self.in_transaction(|conn| {
            let Some(task) = task_repo::get_task(conn, id)? else {
                return Ok(None);
            };
            if task.completed == completed {
                return Ok(Some(task));
            }
            apply_completion(conn, &task.id, completed, &now)
        })
    }

    /// Delete each task together with its whole subtree. Missing ids are
    /// skipped. Returns the number of rows removed.
    pub fn delete(&self, ids: &[TaskId]) -> Result<usize> {
        self.delete_at(ids, Utc::now())
    }

    pub fn delete_at(&self, ids: &[TaskId], now: DateTime<Utc>) -> Result<usize> {
        self.in_transaction(|conn| {
            let mut former_groups: Vec<Option<TaskId>> = Vec::new();
            let mut removed = 0;

            for id in ids {
                // Already gone, or swept up with an ancestor earlier in the list
                let Some(task) = task_repo::get_task(conn, id)? else {
                    continue;
                };
                if !former_groups.contains(&task.parent_id) {
                    former_groups.push(task.parent_id.clone());
                }
                removed += task_repo::delete_subtree(conn, &task.id)?;
            }

            for group in &former_groups {
                match group {
                    Some(parent_id) => {
                        if !task_repo::task_exists(conn, parent_id)? {
                            continue;
                        }
                        task_repo::renumber_group(conn, Some(parent_id))?;
                        propagation::update_parent_completion_status(conn, parent_id, &now)?;
                    }
                    None => task_repo::renumber_group(conn, None)?,
                }
            }

            info!(count = removed, "deleted tasks");
            Ok(removed)
        })
    }

    /// Move each task to `due_date`, along with every descendant that is not
    /// yet completed. Returns the number of distinct tasks rescheduled.
    pub fn reassign_due_date(&self, ids: &[TaskId], due_date: DateTime<Utc>) -> Result<usize> {
        self.in_transaction(|conn| {
            let mut changed: HashSet<TaskId> = HashSet::new();
            for id in ids {
                if !task_repo::task_exists(conn, id)? {
                    continue;
                }
                task_repo::set_due_date(conn, id, &due_date)?;
                changed.insert(id.clone());
                changed.extend(task_repo::set_open_descendants_due_date(conn, id, &due_date)?);
            }
            info!(count = changed.len(), due = %due_date, "rescheduled tasks");
            Ok(changed.len())
        })
    }

    /// Rewrite every sibling group to a gap-free 0..n-1 sequence.
    pub fn normalize_orders(&self) -> Result<()> {
        self.in_transaction(|conn| {
            for group in task_repo::list_parent_groups(conn)? {
                task_repo::renumber_group(conn, group.as_ref())?;
            }
            Ok(())
        })
    }
}

/// Set a task's flag, push it down to the whole subtree so the task agrees
/// with its children, then propagate upward.
fn apply_completion(
    conn: &Connection,
    id: &TaskId,
    completed: bool,
    now: &DateTime<Utc>,
) -> Result<Option<Task>> {
    task_repo::set_completed(conn, id, completed, now)?;
    let cascaded = task_repo::set_descendants_completed(conn, id, completed, now)?;
    propagation::propagate(conn, id, now)?;
    debug!(task_id = %id, completed, cascaded, "completion changed");
    task_repo::get_task(conn, id)
}
