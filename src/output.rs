use std::io::IsTerminal;

use act::commands::{task::TaskCommand, DataCommand};
use act::types::{DateBucket, Task, TaskTree};
use act::view;
use chrono::Local;
use owo_colors::{OwoColorize, Style};

use crate::Command;

/// Color policy: --no-color > NO_COLOR env > TERM=dumb > !isatty > default (color)
fn should_use_color_for(no_color_flag: bool, is_tty: bool) -> bool {
    if no_color_flag {
        return false;
    }
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("TERM").ok().as_deref() == Some("dumb") {
        return false;
    }
    is_tty
}

/// Color scheme for output
struct Colors {
    task_id: Style,
    completed: Style,
    pending: Style,
    root: Style,
    tree_line: Style,
    date: Style,
    error: Style,
}

impl Colors {
    fn new(use_color: bool) -> Self {
        if use_color {
            Self {
                task_id: Style::new().cyan().dimmed(),
                completed: Style::new().green(),
                pending: Style::new().yellow(),
                root: Style::new().bold(),
                tree_line: Style::new().dimmed(),
                date: Style::new().blue(),
                error: Style::new().red().bold(),
            }
        } else {
            // No-op styles when color disabled
            Self {
                task_id: Style::new(),
                completed: Style::new(),
                pending: Style::new(),
                root: Style::new(),
                tree_line: Style::new(),
                date: Style::new(),
                error: Style::new(),
            }
        }
    }
}

/// Handles human-readable CLI output.
pub struct Printer {
    colors: Colors,
}

impl Printer {
    /// Create printer for stdout (standard output)
    pub fn new(no_color_flag: bool) -> Self {
        let use_color = should_use_color_for(no_color_flag, std::io::stdout().is_terminal());
        Self {
            colors: Colors::new(use_color),
        }
    }

    /// Create printer for stderr (error output)
    pub fn new_for_stderr(no_color_flag: bool) -> Self {
        let use_color = should_use_color_for(no_color_flag, std::io::stderr().is_terminal());
        Self {
            colors: Colors::new(use_color),
        }
    }

    /// Print an error message to stderr with appropriate coloring
    pub fn print_error(&self, message: &str) {
        eprintln!("{}", message.style(self.colors.error));
    }

    fn fmt_id(&self, id: &impl std::fmt::Display) -> String {
        format!("{}", id.to_string().style(self.colors.task_id))
    }

    fn status_symbol_style(&self, completed: bool) -> (&'static str, Style) {
        if completed {
            ("✓", self.colors.completed)
        } else {
            ("○", self.colors.pending)
        }
    }

    fn fmt_task(&self, task: &Task) -> String {
        let (sym, style) = self.status_symbol_style(task.completed);
        let due = task.due_date.with_timezone(&Local).format("%b %-d");
        format!(
            "[{}] {} - {} {}",
            sym.style(style),
            self.fmt_id(&task.id),
            task.name,
            format!("({due})").style(self.colors.date)
        )
    }

    pub fn print(&self, command: &Command, output: &str) {
        match command {
            Command::Init => println!("Initialized act database"),
            Command::Task(cmd) => self.print_task_command(cmd, output),
            Command::Data(DataCommand::Export { .. }) => self.print_data_export(output),
            // PRECONDITION: Completions handled in main() before print() is called
            Command::Completions { .. } => unreachable!("completions handled before print()"),
        }
    }

    fn print_task_command(&self, cmd: &TaskCommand, output: &str) {
        match cmd {
            TaskCommand::Rm { .. } => self.print_count(output, "Deleted"),
            TaskCommand::Mv(_) => match serde_json::from_str::<Vec<serde_json::Value>>(output) {
                Ok(moved) => println!("Moved {} task(s)", moved.len()),
                Err(_) => println!("{}", output),
            },
            TaskCommand::Reschedule(_) => self.print_count(output, "Rescheduled"),
            TaskCommand::List(args) if !args.flat => self.print_task_list_tree(output),
            TaskCommand::List(_) | TaskCommand::Reorder(_) | TaskCommand::Subtree { .. } => {
                self.print_task_list_flat(output)
            }
            TaskCommand::Filters => self.print_buckets(output),
            TaskCommand::Tree { .. } => self.print_trees(output),
            TaskCommand::Columns(_) => self.print_columns(output),
            TaskCommand::Normalize => println!("Sibling order normalized"),
            TaskCommand::Add(_)
            | TaskCommand::Rename { .. }
            | TaskCommand::Toggle { .. }
            | TaskCommand::Done { .. }
            | TaskCommand::Undone { .. }
            | TaskCommand::Shift { .. } => self.print_task(output),
        }
    }

    fn print_count(&self, output: &str, verb: &str) {
        let count = serde_json::from_str::<serde_json::Value>(output)
            .ok()
            .and_then(|v| v.get("count").and_then(|c| c.as_u64()))
            .unwrap_or(0);
        println!("{} {} task(s)", verb, count);
    }

    fn print_task(&self, output: &str) {
        if output.trim() == "null" {
            println!("Task not found, nothing changed");
        } else if let Ok(task) = serde_json::from_str::<Task>(output) {
            println!("{}", self.fmt_task(&task));
        } else {
            println!("{}", output);
        }
    }

    fn print_task_list_flat(&self, output: &str) {
        let Ok(tasks) = serde_json::from_str::<Vec<Task>>(output) else {
            println!("{}", output);
            return;
        };
        if tasks.is_empty() {
            println!("No tasks found");
            return;
        }
        for task in &tasks {
            println!("{}", self.fmt_task(task));
        }
        self.print_summary(&tasks);
    }

    fn print_task_list_tree(&self, output: &str) {
        let Ok(tasks) = serde_json::from_str::<Vec<Task>>(output) else {
            println!("{}", output);
            return;
        };
        if tasks.is_empty() {
            println!("No tasks found");
            return;
        }
        for root in &view::build_forest(&tasks) {
            self.print_tree_node(root, "", true, true);
        }
        self.print_summary(&tasks);
    }

    fn print_trees(&self, output: &str) {
        let Ok(trees) = serde_json::from_str::<Vec<TaskTree>>(output) else {
            println!("{}", output);
            return;
        };
        if trees.is_empty() {
            println!("No tasks found");
            return;
        }
        for (i, tree) in trees.iter().enumerate() {
            self.print_tree_node(tree, "", true, true);
            if i < trees.len() - 1 {
                println!();
            }
        }
    }

    fn print_tree_node(&self, tree: &TaskTree, prefix: &str, is_last: bool, is_root: bool) {
        let line = self.fmt_task(&tree.task);
        if is_root {
            println!("{}", line.style(self.colors.root));
        } else {
            let connector = if is_last { "└─" } else { "├─" };
            println!(
                "{}{} {}",
                prefix.style(self.colors.tree_line),
                connector.style(self.colors.tree_line),
                line
            );
        }

        let new_prefix = if is_root {
            String::new()
        } else {
            format!("{}{}  ", prefix, if is_last { " " } else { "│" })
        };
        for (i, child) in tree.children.iter().enumerate() {
            self.print_tree_node(child, &new_prefix, i == tree.children.len() - 1, false);
        }
    }

    fn print_buckets(&self, output: &str) {
        let Ok(buckets) = serde_json::from_str::<Vec<DateBucket>>(output) else {
            println!("{}", output);
            return;
        };
        let width = buckets.iter().map(|b| b.label.len()).max().unwrap_or(0);
        for bucket in &buckets {
            println!(
                "{:width$}  {}/{} complete  {}",
                bucket.label,
                bucket.counts.completed.style(self.colors.completed),
                bucket.counts.total,
                bucket.filter.to_string().style(self.colors.task_id),
                width = width
            );
        }
    }

    fn print_columns(&self, output: &str) {
        let Ok(columns) = serde_json::from_str::<Vec<Vec<Task>>>(output) else {
            println!("{}", output);
            return;
        };
        for (i, column) in columns.iter().enumerate() {
            println!("{}", format!("Column {}", i + 1).style(self.colors.root));
            if column.is_empty() {
                println!("  (empty)");
            }
            for task in column {
                println!("  {}", self.fmt_task(task));
            }
        }
    }

    fn print_data_export(&self, output: &str) {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(output) {
            let path = json.get("path").and_then(|v| v.as_str()).unwrap_or("?");
            let tasks = json.get("tasks").and_then(|v| v.as_u64()).unwrap_or(0);
            println!("Exported {} task(s) to {}", tasks, path);
        } else {
            println!("{}", output);
        }
    }

    /// Footer: "X/Y complete"
    fn print_summary(&self, tasks: &[Task]) {
        let completed = tasks.iter().filter(|t| t.completed).count();
        println!();
        println!(
            "{}/{} complete",
            completed.style(self.colors.completed),
            tasks.len()
        );
    }
}
