use std::fs;
use std::path::PathBuf;

use clap::Subcommand;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::task_repo;
use crate::error::Result;
use crate::types::Task;

const EXPORT_VERSION: &str = "1.0";

#[derive(Subcommand, Clone)]
pub enum DataCommand {
    /// Export all tasks to a JSON file
    Export {
        /// Output file path (default: act-export.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub version: String,
    pub exported_at: String,
    pub tasks: Vec<Task>,
}

pub enum DataResult {
    Exported { path: String, tasks: usize },
}

pub fn handle(conn: &Connection, cmd: DataCommand) -> Result<DataResult> {
    match cmd {
        DataCommand::Export { output } => export_data(conn, output),
    }
}

pub(crate) fn export_data(conn: &Connection, output: Option<PathBuf>) -> Result<DataResult> {
    let output_path = output.unwrap_or_else(|| PathBuf::from("act-export.json"));

    let data = ExportData {
        version: EXPORT_VERSION.to_string(),
        exported_at: chrono::Utc::now().to_rfc3339(),
        tasks: task_repo::list_all(conn)?,
    };

    fs::write(&output_path, serde_json::to_string_pretty(&data)?)?;
    tracing::info!(path = %output_path.display(), tasks = data.tasks.len(), "exported tasks");

    Ok(DataResult::Exported {
        path: output_path.display().to_string(),
        tasks: data.tasks.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskService;
    use crate::db::schema;
    use crate::types::CreateTaskInput;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn export_writes_every_task() {
        let conn = setup_db();
        let svc = TaskService::new(&conn);
        let parent = svc
            .create(&CreateTaskInput {
                name: "Parent".to_string(),
                ..Default::default()
            })
            .unwrap();
        svc.create(&CreateTaskInput {
            name: "Child".to_string(),
            parent_id: Some(parent.id.clone()),
            due_date: None,
        })
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let DataResult::Exported { tasks, .. } = export_data(&conn, Some(path.clone())).unwrap();
        assert_eq!(tasks, 2);

        let data: ExportData = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(data.version, EXPORT_VERSION);
        assert_eq!(data.tasks.len(), 2);
        assert!(data
            .tasks
            .iter()
            .any(|t| t.parent_id.as_ref() == Some(&parent.id)));
    }
}
