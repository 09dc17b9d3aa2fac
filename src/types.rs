use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ActError;
use crate::id::TaskId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub parent_id: Option<TaskId>,
    pub name: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// Position within the sibling group sharing `parent_id`
    pub order: i64,
}

#[derive(Debug, Clone, Default)]
pub struct CreateTaskInput {
    pub name: String,
    pub parent_id: Option<TaskId>,
    /// Defaults to the creation instant
    pub due_date: Option<DateTime<Utc>>,
}

/// Which slice of the task set to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum DateFilter {
    #[default]
    All,
    Today,
    Tomorrow,
    Yesterday,
    Date(NaiveDate),
    /// Inclusive on both ends
    Range { start: NaiveDate, end: NaiveDate },
}

impl DateFilter {
    /// Buckets that pull incomplete past-due tasks into their result
    pub fn rolls_forward(&self) -> bool {
        matches!(self, DateFilter::Today | DateFilter::Tomorrow)
    }
}

impl fmt::Display for DateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateFilter::All => write!(f, "all"),
            DateFilter::Today => write!(f, "today"),
            DateFilter::Tomorrow => write!(f, "tomorrow"),
            DateFilter::Yesterday => write!(f, "yesterday"),
            DateFilter::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            DateFilter::Range { start, end } => write!(
                f,
                "{}..{}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            ),
        }
    }
}

impl FromStr for DateFilter {
    type Err = ActError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "all" => return Ok(DateFilter::All),
            "today" => return Ok(DateFilter::Today),
            "tomorrow" => return Ok(DateFilter::Tomorrow),
            "yesterday" => return Ok(DateFilter::Yesterday),
            _ => {}
        }
        if let Some((start, end)) = s.split_once("..") {
            return Ok(DateFilter::Range {
                start: parse_day(start)?,
                end: parse_day(end)?,
            });
        }
        parse_day(s).map(DateFilter::Date)
    }
}

fn parse_day(s: &str) -> Result<NaiveDate, ActError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| ActError::InvalidDate(s.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketCounts {
    pub total: usize,
    pub completed: usize,
}

/// A browsable date grouping shown in the filter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateBucket {
    pub filter: DateFilter,
    pub date: NaiveDate,
    pub label: String,
    pub counts: BucketCounts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTree {
    pub task: Task,
    pub children: Vec<TaskTree>,
}
