use std::io;
use std::path::{Path, PathBuf};

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use act::commands::{data, task, DataCommand, DataResult, TaskCommand, TaskResult};
use act::db::Store;
use act::error;

mod output;

use output::Printer;

#[derive(Parser)]
#[command(name = "act")]
#[command(version)]
#[command(
    about = "act - hierarchical to-do lists",
    long_about = r#"
act - hierarchical to-do lists from the terminal.

Features:
  • Arbitrarily deep task trees with parent/child completion
  • Drag-style moves and reordering that keep sibling order gap-free
  • Date buckets (Today, Tomorrow, Yesterday, past days) with overdue roll-forward

Environment:
  ACT_DB_PATH  Override database location
  ACT_LOG      Log filter (e.g. debug, act=trace)
  NO_COLOR     Disable colored output
"#
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output in JSON format (for programmatic use)
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Override database path (default: ~/.act/act.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Clone)]
pub(crate) enum Command {
    #[command(flatten)]
    Task(TaskCommand),

    /// Data export
    #[command(subcommand)]
    Data(DataCommand),

    /// Initialize the database
    Init,

    /// Generate shell completions
    #[command(
        about = "Generate shell completions",
        long_about = r#"
Generate shell completions for the act CLI.

Examples:
  act completions bash > ~/.local/share/bash-completion/completions/act
  act completions zsh > ~/.zfunc/_act
  act completions fish > ~/.config/fish/completions/act.fish
"#
    )]
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

/// Resolution order:
/// 1. ACT_DB_PATH env var (if set)
/// 2. ~/.act/act.db
/// 3. ./.act/act.db when no home directory is known
fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("ACT_DB_PATH") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".act")
        .join("act.db")
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("ACT_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    // PRECONDITION: Completions bypass normal output flow - raw shell script to stdout
    if let Command::Completions { shell } = &cli.command {
        generate(*shell, &mut Cli::command(), "act", &mut io::stdout());
        return;
    }

    init_logging(cli.verbose);

    let db_path = cli.db.clone().unwrap_or_else(default_db_path);

    match run(&cli.command, &db_path) {
        Ok(output) => {
            if cli.json {
                println!("{}", output);
            } else {
                let printer = Printer::new(cli.no_color);
                printer.print(&cli.command, &output);
            }
        }
        Err(e) => {
            if cli.json {
                let err = serde_json::json!({ "error": e.to_string() });
                eprintln!("{}", err);
            } else {
                let printer = Printer::new_for_stderr(cli.no_color);
                printer.print_error(&format!("Error: {}", e));
            }
            std::process::exit(1);
        }
    }
}

fn run(command: &Command, db_path: &Path) -> error::Result<String> {
    let store = Store::open(db_path)?;

    let output = match command {
        Command::Init => serde_json::json!({ "initialized": true, "path": db_path }).to_string(),
        Command::Task(cmd) => match task::handle(store.conn(), cmd.clone())? {
            TaskResult::One(t) => serde_json::to_string_pretty(&t)?,
            TaskResult::MaybeOne(t) => serde_json::to_string_pretty(&t)?,
            TaskResult::Many(ts) => serde_json::to_string_pretty(&ts)?,
            TaskResult::Deleted(count) => serde_json::json!({ "deleted": true, "count": count }).to_string(),
            TaskResult::Moved(ids) => serde_json::to_string_pretty(&ids)?,
            TaskResult::Rescheduled(count) => {
                serde_json::json!({ "rescheduled": true, "count": count }).to_string()
            }
            TaskResult::Buckets(buckets) => serde_json::to_string_pretty(&buckets)?,
            TaskResult::Trees(trees) => serde_json::to_string_pretty(&trees)?,
            TaskResult::Columns(columns) => serde_json::to_string_pretty(&columns)?,
            TaskResult::Ok => serde_json::json!({ "ok": true }).to_string(),
        },
        Command::Data(cmd) => match data::handle(store.conn(), cmd.clone())? {
            DataResult::Exported { path, tasks } => serde_json::to_string_pretty(&serde_json::json!({
                "exported": true,
                "path": path,
                "tasks": tasks
            }))?,
        },
        // PRECONDITION: Completions handled in main() before run() is called
        Command::Completions { .. } => unreachable!("completions handled before run()"),
    };

    store.close()?;
    Ok(output)
}
