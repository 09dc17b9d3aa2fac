use rusqlite::Connection;

use crate::error::Result;

const SCHEMA_VERSION: i32 = 2;

pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if current_version == 0 {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY CHECK (id LIKE 'task_%'),
                name TEXT NOT NULL CHECK (name <> ''),
                parent_id TEXT REFERENCES tasks(id) ON DELETE CASCADE CHECK (parent_id LIKE 'task_%'),
                completed INTEGER NOT NULL DEFAULT 0,
                completed_at TEXT,
                created_at TEXT NOT NULL,
                due_date TEXT NOT NULL,
                task_order INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);
            CREATE INDEX IF NOT EXISTS idx_tasks_completed ON tasks(completed);
            CREATE INDEX IF NOT EXISTS idx_tasks_parent_order ON tasks(parent_id, task_order);
            CREATE INDEX IF NOT EXISTS idx_tasks_created ON tasks(created_at);
            CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due_date);
            "#,
        )?;

        // Fresh database gets the latest schema version
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        return Ok(());
    }

    // Version 1 databases predate due dates: tasks were bucketed by creation day
    if current_version == 1 {
        conn.execute_batch(
            r#"
            BEGIN;
            ALTER TABLE tasks ADD COLUMN due_date TEXT NOT NULL DEFAULT '';
            UPDATE tasks SET due_date = created_at WHERE due_date = '';
            CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due_date);
            COMMIT;
            "#,
        )?;
        conn.pragma_update(None, "user_version", 2)?;
    }

    Ok(())
}

/// Open a connection with foreign keys enforced and the schema migrated.
pub fn open_db(path: &std::path::Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
    init_schema(&conn)?;
    Ok(conn)
}
