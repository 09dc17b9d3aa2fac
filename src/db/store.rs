use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::debug;

use crate::db::schema;
use crate::error::{ActError, Result};

/// Owned database handle. Opened once at process start and passed by reference
/// to the services that need it; closed explicitly at shutdown.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = schema::open_db(path)?;
        debug!(path = %path.display(), "opened task store");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Flush and release the connection, surfacing any close error.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, err)| ActError::Database(err))?;
        if let Some(path) = &self.path {
            debug!(path = %path.display(), "closed task store");
        }
        Ok(())
    }
}
