//! Command-line surface: one [`clap`] derive tree mirroring §6 of the
//! specification this crate implements.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::styling::{AnsiColor, Color, Styles};
use clap::{Parser, Subcommand};

fn help_styles() -> Styles {
    Styles::styled()
        .header(anstyle::Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .usage(anstyle::Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .literal(anstyle::Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .placeholder(anstyle::Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(anstyle::Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
}

#[derive(Parser)]
#[command(name = "bar")]
#[command(about = "Isolated worktree-based agent task runner", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(styles = help_styles())]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output regardless of terminal support
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize bar's storage root for the current repository
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Manage isolated task workspaces
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },
    /// Run a command inside the active task's workspace, recording a step
    Run {
        #[arg(last = true, required = true)]
        argv: Vec<String>,
        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,
        #[arg(long)]
        no_record: bool,
        #[arg(long = "env", value_parser = parse_env_kv)]
        env: Vec<(String, String)>,
        #[arg(long)]
        cwd: Option<String>,
    },
    /// Run an interactive command with stdio inherited, recording a step if it changed anything
    Wrap {
        #[arg(last = true, required = true)]
        argv: Vec<String>,
        #[arg(long)]
        no_ui: bool,
        #[arg(long, default_value_t = 0)]
        port: u16,
    },
    /// Show the diff between the active task's workspace and its base
    Diff {
        #[arg(long)]
        step: Option<String>,
        #[arg(long)]
        stat: bool,
        #[arg(long)]
        output: Option<String>,
        #[arg(long, value_enum, default_value_t = DiffFormatArg::Patch)]
        format: DiffFormatArg,
    },
    /// Land the active task's changes onto its base ref
    Apply {
        #[arg(long)]
        message: Option<String>,
        #[arg(long)]
        no_close: bool,
    },
    /// Discard the active task's outstanding changes
    Rollback {
        #[arg(long)]
        base: bool,
        #[arg(long)]
        hard: bool,
        #[arg(long)]
        step: Option<String>,
    },
    /// Report the active task's status
    Status {
        #[arg(long, value_enum, default_value_t = StatusFormatArg::Text)]
        format: StatusFormatArg,
    },
    /// Show the ledger of steps recorded for the active task
    Log {
        #[arg(long)]
        step: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, value_enum, default_value_t = LogFormatArg::Table)]
        format: LogFormatArg,
        #[arg(long)]
        output: Option<String>,
    },
    /// Start the minimal status server for the active task
    Ui {
        #[arg(long, default_value_t = 0)]
        port: u16,
        #[arg(long)]
        no_open: bool,
    },
    /// Report the installed version
    Update {
        #[arg(long)]
        check: bool,
    },
    /// Print the installed version
    Version,
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Create a new task and its isolated workspace
    Start {
        name: String,
        #[arg(long)]
        base: Option<String>,
        #[arg(long)]
        no_switch: bool,
    },
    /// List known tasks
    List {
        #[arg(long)]
        all: bool,
    },
    /// Switch the active task
    Switch { id_or_name: String },
    /// Close a task, tearing down its workspace
    Close {
        id: Option<String>,
        #[arg(long)]
        keep: bool,
        #[arg(long)]
        delete: bool,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum DiffFormatArg {
    Patch,
    Stat,
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum StatusFormatArg {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogFormatArg {
    Table,
    Json,
    Markdown,
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (number, suffix) = s.split_at(s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len()));
    let n: u64 = number.parse().map_err(|_| format!("invalid duration: {s}"))?;
    match suffix {
        "" | "s" => Ok(Duration::from_secs(n)),
        "ms" => Ok(Duration::from_millis(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        "h" => Ok(Duration::from_secs(n * 3600)),
        other => Err(format!("unknown duration suffix `{other}`; use s, ms, m, or h")),
    }
}

fn parse_env_kv(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))
}

/// Resolve the working directory a subcommand should discover its
/// repository from — always the process cwd; bar has no `-C` flag.
pub fn cwd() -> anyhow::Result<PathBuf> {
    Ok(std::env::current_dir()?)
}
