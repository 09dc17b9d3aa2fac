//! Task identifiers.
//!
//! Every node of the tree, root or nested, is keyed by a `task_`-prefixed
//! ULID such as `task_01ARZ3NDEKTSV4RRFFQ69G5FAV`. ULIDs sort by creation
//! time, which the store uses as the last tie-breaker in sibling order.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdParseError {
    #[error("Invalid ULID format: {0}")]
    InvalidUlid(String),
    #[error("Missing prefix: expected '{expected}', got '{actual}'")]
    MissingPrefix {
        expected: &'static str,
        actual: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub const PREFIX: &'static str = "task_";

    /// A fresh id for a task being inserted.
    pub fn new() -> Self {
        Self(format!("{}{}", Self::PREFIX, ulid::Ulid::new()))
    }

    pub fn ulid_part(&self) -> &str {
        self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0)
    }

    /// Last 6 ULID characters, enough to tell tasks apart in a listing
    pub fn short(&self) -> &str {
        let ulid = self.ulid_part();
        &ulid[ulid.len().saturating_sub(6)..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| IdParseError::MissingPrefix {
                expected: Self::PREFIX,
                actual: s.to_string(),
            })?;
        ulid::Ulid::from_string(ulid).map_err(|_| IdParseError::InvalidUlid(ulid.to_string()))?;
        Ok(Self(s.to_string()))
    }
}

impl ToSql for TaskId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

/// Rejects column values that are not well-formed task ids.
impl FromSql for TaskId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: IdParseError| FromSqlError::Other(Box::new(e)))
    }
}
