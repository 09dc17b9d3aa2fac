//! SQL primitives over the `tasks` table. No business rules live here: callers
//! decide ordering, propagation and transaction scope.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{ActError, Result};
use crate::id::TaskId;
use crate::types::Task;

const SELECT_TASK: &str =
    "SELECT id, name, parent_id, completed, completed_at, created_at, due_date, task_order FROM tasks";

/// Fixed-width UTC form so that string comparison matches time order.
pub fn fmt_ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
    let created_at = row
        .get::<_, String>("created_at")
        .ok()
        .and_then(|s| parse_ts(&s))
        .unwrap_or_else(Utc::now);
    Ok(Task {
        id: row.get("id")?,
        parent_id: row.get("parent_id")?,
        name: row.get("name")?,
        completed: row.get::<_, i32>("completed")? != 0,
        completed_at: row
            .get::<_, Option<String>>("completed_at")?
            .and_then(|s| parse_ts(&s)),
        created_at,
        due_date: row
            .get::<_, String>("due_date")
            .ok()
            .and_then(|s| parse_ts(&s))
            .unwrap_or(created_at),
        order: row.get("task_order")?,
    })
}

fn query_tasks(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(sql)?;
    let tasks = stmt
        .query_map(params, row_to_task)?
        .collect::<rusqlite::Result<Vec<Task>>>()?;
    Ok(tasks)
}

/// Next free position at the end of a sibling group (0 for an empty group).
pub fn next_order(conn: &Connection, parent_id: Option<&TaskId>) -> Result<i64> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(task_order) + 1, 0) FROM tasks WHERE parent_id IS ?1",
        params![parent_id],
        |row| row.get(0),
    )?;
    Ok(next)
}

pub fn insert_task(
    conn: &Connection,
    name: &str,
    parent_id: Option<&TaskId>,
    due_date: &DateTime<Utc>,
    now: &DateTime<Utc>,
) -> Result<Task> {
    let id = TaskId::new();
    let order = next_order(conn, parent_id)?;

    conn.execute(
        r#"
        INSERT INTO tasks (id, name, parent_id, completed, created_at, due_date, task_order)
        VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6)
        "#,
        params![&id, name, parent_id, fmt_ts(now), fmt_ts(due_date), order],
    )?;

    get_task(conn, &id)?.ok_or(ActError::TaskNotFound(id))
}

pub fn get_task(conn: &Connection, id: &TaskId) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            &format!("{SELECT_TASK} WHERE id = ?1"),
            params![id],
            row_to_task,
        )
        .optional()?;
    Ok(task)
}

pub fn task_exists(conn: &Connection, id: &TaskId) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn list_all(conn: &Connection) -> Result<Vec<Task>> {
    query_tasks(
        conn,
        &format!("{SELECT_TASK} ORDER BY task_order ASC, created_at ASC, id ASC"),
        [],
    )
}

/// Direct children of `parent_id` (root group for `None`) in display order.
pub fn get_children(conn: &Connection, parent_id: Option<&TaskId>) -> Result<Vec<Task>> {
    query_tasks(
        conn,
        &format!(
            "{SELECT_TASK} WHERE parent_id IS ?1 ORDER BY task_order ASC, created_at ASC, id ASC"
        ),
        params![parent_id],
    )
}

/// Tasks due within `[start, end]`, both inclusive.
pub fn list_due_between(
    conn: &Connection,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<Vec<Task>> {
    query_tasks(
        conn,
        &format!(
            "{SELECT_TASK} WHERE due_date >= ?1 AND due_date <= ?2 \
             ORDER BY task_order ASC, created_at ASC, id ASC"
        ),
        params![fmt_ts(start), fmt_ts(end)],
    )
}

/// Incomplete tasks due strictly before `before`, least overdue first.
pub fn list_overdue(conn: &Connection, before: &DateTime<Utc>) -> Result<Vec<Task>> {
    query_tasks(
        conn,
        &format!(
            "{SELECT_TASK} WHERE completed = 0 AND due_date < ?1 \
             ORDER BY due_date DESC, task_order ASC, id ASC"
        ),
        params![fmt_ts(before)],
    )
}

/// Every task's due date and completion flag, for bucket derivation.
pub fn list_due_dates(conn: &Connection) -> Result<Vec<(DateTime<Utc>, bool)>> {
    let mut stmt = conn.prepare("SELECT due_date, completed FROM tasks")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)? != 0))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows
        .into_iter()
        .filter_map(|(due, completed)| parse_ts(&due).map(|d| (d, completed)))
        .collect())
}

pub fn set_name(conn: &Connection, id: &TaskId, name: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE tasks SET name = ?1 WHERE id = ?2",
        params![name, id],
    )?;
    Ok(changed > 0)
}

/// Sets `completed` and keeps `completed_at` in lockstep with it.
pub fn set_completed(
    conn: &Connection,
    id: &TaskId,
    completed: bool,
    at: &DateTime<Utc>,
) -> Result<()> {
    let completed_at = completed.then(|| fmt_ts(at));
    conn.execute(
        "UPDATE tasks SET completed = ?1, completed_at = ?2 WHERE id = ?3",
        params![completed as i32, completed_at, id],
    )?;
    Ok(())
}

pub fn set_parent(
    conn: &Connection,
    id: &TaskId,
    parent_id: Option<&TaskId>,
    order: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET parent_id = ?1, task_order = ?2 WHERE id = ?3",
        params![parent_id, order, id],
    )?;
    Ok(())
}

pub fn set_order(conn: &Connection, id: &TaskId, order: i64) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET task_order = ?1 WHERE id = ?2",
        params![order, id],
    )?;
    Ok(())
}

pub fn set_due_date(conn: &Connection, id: &TaskId, due_date: &DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET due_date = ?1 WHERE id = ?2",
        params![fmt_ts(due_date), id],
    )?;
    Ok(())
}

/// All transitive descendants of `id`, excluding `id` itself.
pub fn descendant_ids(conn: &Connection, id: &TaskId) -> Result<Vec<TaskId>> {
    let mut stmt = conn.prepare(
        r#"
        WITH RECURSIVE subtree(id) AS (
            SELECT id FROM tasks WHERE parent_id = ?1
            UNION
            SELECT t.id FROM tasks t INNER JOIN subtree s ON t.parent_id = s.id
        )
        SELECT id FROM subtree
        "#,
    )?;
    let ids = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<TaskId>>>()?;
    Ok(ids)
}

/// Sets the completion flag on every descendant of `id` whose flag differs.
pub fn set_descendants_completed(
    conn: &Connection,
    id: &TaskId,
    completed: bool,
    at: &DateTime<Utc>,
) -> Result<usize> {
    let completed_at = completed.then(|| fmt_ts(at));
    let changed = conn.execute(
        r#"
        WITH RECURSIVE subtree(id) AS (
            SELECT id FROM tasks WHERE parent_id = ?3
            UNION
            SELECT t.id FROM tasks t INNER JOIN subtree s ON t.parent_id = s.id
        )
        UPDATE tasks SET completed = ?1, completed_at = ?2
        WHERE id IN (SELECT id FROM subtree) AND completed <> ?1
        "#,
        params![completed as i32, completed_at, id],
    )?;
    Ok(changed)
}

/// Reschedules every incomplete descendant of `id` and returns their ids.
/// Completed descendants keep the date they were finished under.
pub fn set_open_descendants_due_date(
    conn: &Connection,
    id: &TaskId,
    due_date: &DateTime<Utc>,
) -> Result<Vec<TaskId>> {
    let mut stmt = conn.prepare(
        r#"
        WITH RECURSIVE subtree(id) AS (
            SELECT id FROM tasks WHERE parent_id = ?2
            UNION
            SELECT t.id FROM tasks t INNER JOIN subtree s ON t.parent_id = s.id
        )
        UPDATE tasks SET due_date = ?1
        WHERE id IN (SELECT id FROM subtree) AND completed = 0
        RETURNING id
        "#,
    )?;
    let ids = stmt
        .query_map(params![fmt_ts(due_date), id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<TaskId>>>()?;
    Ok(ids)
}

/// Removes `id` and, explicitly, every descendant. Does not rely on the
/// foreign key cascade being enabled on this connection.
pub fn delete_subtree(conn: &Connection, id: &TaskId) -> Result<usize> {
    let mut doomed = descendant_ids(conn, id)?;
    doomed.push(id.clone());
    let mut removed = 0;
    // Deepest rows were discovered last; delete them first so no row ever
    // points at a missing parent mid-operation.
    for task_id in doomed.iter().rev() {
        removed += conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
    }
    Ok(removed)
}

/// Rewrites a sibling group's `task_order` to 0..n-1, keeping current order.
pub fn renumber_group(conn: &Connection, parent_id: Option<&TaskId>) -> Result<()> {
    let siblings = get_children(conn, parent_id)?;
    for (index, task) in siblings.iter().enumerate() {
        let index = index as i64;
        if task.order != index {
            set_order(conn, &task.id, index)?;
        }
    }
    Ok(())
}

/// Every distinct `parent_id` value currently in use, including the root group.
pub fn list_parent_groups(conn: &Connection) -> Result<Vec<Option<TaskId>>> {
    let mut stmt = conn.prepare("SELECT DISTINCT parent_id FROM tasks")?;
    let groups = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<Option<TaskId>>>>()?;
    Ok(groups)
}
