//! Pure projections over an already-loaded task set.
//!
//! None of these re-sort: the slice's order is whatever the store returned,
//! which already encodes sibling order and overdue-first priority.

use std::collections::HashMap;

use crate::id::TaskId;
use crate::types::{Task, TaskTree};

/// Direct children of `parent_id` (root level for `None`), in incoming order.
pub fn children_of<'t>(
    tasks: &'t [Task],
    parent_id: Option<&TaskId>,
    include_completed: bool,
) -> Vec<&'t Task> {
    tasks
        .iter()
        .filter(|t| t.parent_id.as_ref() == parent_id)
        .filter(|t| include_completed || !t.completed)
        .collect()
}

/// Every descendant of `task_id`: its direct children first, then each
/// child's own subtree in turn.
pub fn subtree_of<'t>(tasks: &'t [Task], task_id: &TaskId) -> Vec<&'t Task> {
    let index = index_by_parent(tasks);
    let mut out = Vec::new();
    collect_subtree(&index, task_id, &mut out);
    out
}

fn index_by_parent(tasks: &[Task]) -> HashMap<&TaskId, Vec<&Task>> {
    let mut index: HashMap<&TaskId, Vec<&Task>> = HashMap::new();
    for task in tasks {
        if let Some(parent_id) = &task.parent_id {
            index.entry(parent_id).or_default().push(task);
        }
    }
    index
}

fn collect_subtree<'t>(
    index: &HashMap<&TaskId, Vec<&'t Task>>,
    task_id: &TaskId,
    out: &mut Vec<&'t Task>,
) {
    let Some(children) = index.get(task_id) else {
        return;
    };
    out.extend(children.iter().copied());
    for child in children {
        collect_subtree(index, &child.id, out);
    }
}

pub fn descendant_count(tasks: &[Task], task_id: &TaskId) -> usize {
    subtree_of(tasks, task_id).len()
}

/// Whether `task_id` may be placed under `new_parent_id` without becoming its
/// own ancestor.
pub fn can_move_under(tasks: &[Task], task_id: &TaskId, new_parent_id: &TaskId) -> bool {
    task_id != new_parent_id
        && !subtree_of(tasks, task_id)
            .iter()
            .any(|t| &t.id == new_parent_id)
}

/// Whether `task_id` is one of the currently expanded column parents.
pub fn ancestor_open(open_parent_ids: &[TaskId], task_id: &TaskId) -> bool {
    open_parent_ids.contains(task_id)
}

/// Whether a task's row is on screen: root rows always are, other rows when
/// their parent's column is expanded.
pub fn in_open_column(open_parent_ids: &[TaskId], task: &Task) -> bool {
    match &task.parent_id {
        None => true,
        Some(parent_id) => ancestor_open(open_parent_ids, parent_id),
    }
}

/// Miller columns for a chain of expanded parents: the root column, then one
/// column of children per open parent.
pub fn open_columns<'t>(
    tasks: &'t [Task],
    open_parent_ids: &[TaskId],
    include_completed: bool,
) -> Vec<Vec<&'t Task>> {
    let mut columns = vec![children_of(tasks, None, include_completed)];
    for parent_id in open_parent_ids {
        columns.push(children_of(tasks, Some(parent_id), include_completed));
    }
    columns
}

/// Nested trees for every task whose parent is absent from `tasks`, so a
/// filtered subset still renders with its top-most members as roots.
pub fn build_forest(tasks: &[Task]) -> Vec<TaskTree> {
    let index = index_by_parent(tasks);
    tasks
        .iter()
        .filter(|t| match &t.parent_id {
            None => true,
            Some(pid) => !tasks.iter().any(|other| &other.id == pid),
        })
        .map(|t| build_tree(&index, t))
        .collect()
}

fn build_tree(index: &HashMap<&TaskId, Vec<&Task>>, task: &Task) -> TaskTree {
    let children = index
        .get(&task.id)
        .map(|kids| kids.iter().map(|k| build_tree(index, k)).collect())
        .unwrap_or_default();
    TaskTree {
        task: task.clone(),
        children,
    }
}
