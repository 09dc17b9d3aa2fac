use chrono::{NaiveDate, TimeZone};
use clap::{Args, Subcommand};
use rusqlite::Connection;

use crate::core::{Calendar, TaskService};
use crate::error::{ActError, Result};
use crate::id::TaskId;
use crate::types::{CreateTaskInput, DateBucket, DateFilter, Task, TaskTree};
use crate::view;

/// Parse TaskId from CLI string (requires prefix)
fn parse_task_id(s: &str) -> std::result::Result<TaskId, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_filter(s: &str) -> std::result::Result<DateFilter, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[derive(Subcommand, Clone)]
pub enum TaskCommand {
    /// Create a task at the end of its sibling list
    Add(AddArgs),
    /// Change a task's name
    Rename {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
        name: String,
    },
    /// Flip a task's completion (cascades to its subtree)
    Toggle {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    /// Mark a task completed
    Done {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    /// Mark a task not completed
    Undone {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    /// Delete tasks and everything beneath them
    Rm {
        #[arg(required = true, value_parser = parse_task_id)]
        ids: Vec<TaskId>,
    },
    /// Move tasks under a new parent (root when --to is omitted)
    Mv(MoveArgs),
    /// Set the full order of one sibling group
    Reorder(ReorderArgs),
    /// Nudge a task up (negative) or down (positive) within its siblings
    Shift {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
        #[arg(allow_negative_numbers = true)]
        by: i64,
    },
    /// Change the due date of tasks and their open descendants
    Reschedule(RescheduleArgs),
    /// List tasks for a date filter
    List(ListArgs),
    /// Show the date buckets with counts
    Filters,
    /// Show tasks as nested trees
    Tree {
        #[arg(value_parser = parse_task_id)]
        id: Option<TaskId>,
    },
    /// List every descendant of a task
    Subtree {
        #[arg(value_parser = parse_task_id)]
        id: TaskId,
    },
    /// Show the columns for a chain of open parents
    Columns(ColumnsArgs),
    /// Close gaps in every sibling group's ordering
    Normalize,
}

#[derive(Args, Clone)]
pub struct AddArgs {
    pub name: String,

    #[arg(long, value_parser = parse_task_id)]
    pub parent: Option<TaskId>,

    /// today, tomorrow, yesterday or YYYY-MM-DD (default: now)
    #[arg(long, value_parser = parse_filter)]
    pub due: Option<DateFilter>,
}

#[derive(Args, Clone)]
pub struct MoveArgs {
    #[arg(required = true, value_parser = parse_task_id)]
    pub ids: Vec<TaskId>,

    #[arg(long, value_parser = parse_task_id)]
    pub to: Option<TaskId>,

    /// Drop position among the destination's existing children (default: end)
    #[arg(long)]
    pub at: Option<usize>,
}

#[derive(Args, Clone)]
pub struct ReorderArgs {
    #[arg(required = true, value_parser = parse_task_id)]
    pub ids: Vec<TaskId>,

    #[arg(long, value_parser = parse_task_id)]
    pub parent: Option<TaskId>,
}

#[derive(Args, Clone)]
pub struct RescheduleArgs {
    #[arg(required = true, value_parser = parse_task_id)]
    pub ids: Vec<TaskId>,

    /// today, tomorrow, yesterday or YYYY-MM-DD
    #[arg(long, value_parser = parse_filter)]
    pub to: DateFilter,
}

#[derive(Args, Clone)]
pub struct ListArgs {
    /// today, tomorrow, yesterday, all, YYYY-MM-DD or FROM..TO
    #[arg(long, short, value_parser = parse_filter, default_value = "all")]
    pub filter: DateFilter,

    /// Leave overdue tasks out of the Today and Tomorrow lists
    #[arg(long)]
    pub no_overdue: bool,

    /// Hide completed tasks
    #[arg(long)]
    pub open: bool,

    /// Show flat list instead of tree view. Human output only; JSON always returns flat array.
    #[arg(long)]
    pub flat: bool,
}

#[derive(Args, Clone)]
pub struct ColumnsArgs {
    /// Open parents from the leftmost column rightwards
    #[arg(value_parser = parse_task_id)]
    pub open: Vec<TaskId>,

    /// Hide completed tasks
    #[arg(long)]
    pub hide_completed: bool,
}

pub enum TaskResult {
    One(Task),
    MaybeOne(Option<Task>),
    Many(Vec<Task>),
    Deleted(usize),
    Moved(Vec<TaskId>),
    Rescheduled(usize),
    Buckets(Vec<DateBucket>),
    Trees(Vec<TaskTree>),
    Columns(Vec<Vec<Task>>),
    Ok,
}

/// Handle a task command against the local calendar.
pub fn handle(conn: &Connection, cmd: TaskCommand) -> Result<TaskResult> {
    handle_with_calendar(conn, cmd, &Calendar::local())
}

pub fn handle_with_calendar<Tz: TimeZone>(
    conn: &Connection,
    cmd: TaskCommand,
    calendar: &Calendar<Tz>,
) -> Result<TaskResult> {
    let svc = TaskService::new(conn);

    match cmd {
        TaskCommand::Add(args) => {
            let due_date = args
                .due
                .map(|f| day_of(&f, calendar))
                .transpose()?
                .map(|d| calendar.midday(d));
            let input = CreateTaskInput {
                name: args.name,
                parent_id: args.parent,
                due_date,
            };
            Ok(TaskResult::One(svc.create(&input)?))
        }

        TaskCommand::Rename { id, name } => Ok(TaskResult::MaybeOne(svc.rename(&id, &name)?)),

        TaskCommand::Toggle { id } => Ok(TaskResult::MaybeOne(svc.toggle(&id)?)),

        TaskCommand::Done { id } => Ok(TaskResult::MaybeOne(svc.set_completed(&id, true)?)),

        TaskCommand::Undone { id } => Ok(TaskResult::MaybeOne(svc.set_completed(&id, false)?)),

        TaskCommand::Rm { ids } => Ok(TaskResult::Deleted(svc.delete(&ids)?)),

        TaskCommand::Mv(args) => {
            svc.validate_move(&args.ids, args.to.as_ref())?;
            let moved = match args.at {
                Some(index) => svc.move_to_position(&args.ids, args.to.as_ref(), index)?,
                None => svc.move_to_parent(&args.ids, args.to.as_ref())?,
            };
            Ok(TaskResult::Moved(moved))
        }

        TaskCommand::Reorder(args) => {
            svc.reorder(&args.ids, args.parent.as_ref())?;
            Ok(TaskResult::Many(svc.list_children(args.parent.as_ref())?))
        }

        TaskCommand::Shift { id, by } => Ok(TaskResult::MaybeOne(svc.shift(&id, by)?)),

        TaskCommand::Reschedule(args) => {
            let due = calendar.midday(day_of(&args.to, calendar)?);
            Ok(TaskResult::Rescheduled(svc.reassign_due_date(&args.ids, due)?))
        }

        TaskCommand::List(args) => {
            let mut tasks = svc.load_tasks_for_filter(&args.filter, calendar, !args.no_overdue)?;
            if args.open {
                tasks.retain(|t| !t.completed);
            }
            Ok(TaskResult::Many(tasks))
        }

        TaskCommand::Filters => Ok(TaskResult::Buckets(svc.list_date_filters(calendar)?)),

        TaskCommand::Tree { id } => {
            let tasks = svc.list_all()?;
            let forest = view::build_forest(&tasks);
            match id {
                Some(id) => {
                    let tree = find_tree(forest, &id).ok_or(ActError::TaskNotFound(id))?;
                    Ok(TaskResult::Trees(vec![tree]))
                }
                None => Ok(TaskResult::Trees(forest)),
            }
        }

        TaskCommand::Subtree { id } => {
            let tasks = svc.list_all()?;
            svc.get(&id)?;
            let subtree = view::subtree_of(&tasks, &id).into_iter().cloned().collect();
            Ok(TaskResult::Many(subtree))
        }

        TaskCommand::Columns(args) => {
            let tasks = svc.list_all()?;
            let columns = view::open_columns(&tasks, &args.open, !args.hide_completed)
                .into_iter()
                .map(|col| col.into_iter().cloned().collect())
                .collect();
            Ok(TaskResult::Columns(columns))
        }

        TaskCommand::Normalize => {
            svc.normalize_orders()?;
            Ok(TaskResult::Ok)
        }
    }
}

/// A single calendar day named by a filter argument.
fn day_of<Tz: TimeZone>(filter: &DateFilter, calendar: &Calendar<Tz>) -> Result<NaiveDate> {
    match filter {
        DateFilter::Today => Ok(calendar.today()),
        DateFilter::Tomorrow => Ok(calendar.tomorrow()),
        DateFilter::Yesterday => Ok(calendar.yesterday()),
        DateFilter::Date(d) => Ok(*d),
        other => Err(ActError::InvalidDate(other.to_string())),
    }
}

fn find_tree(forest: Vec<TaskTree>, id: &TaskId) -> Option<TaskTree> {
    for tree in forest {
        if &tree.task.id == id {
            return Some(tree);
        }
        if let Some(found) = find_tree(tree.children, id) {
            return Some(found);
        }
    }
    None
}
