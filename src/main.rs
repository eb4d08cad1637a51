use std::process;

use clap::Parser;

use bar::commands::{
    self, Context, DiffArgs, DiffFormat, LogArgs, LogFormat, RollbackArgs, RunArgs, StatusFormat,
    WrapArgs,
};
use bar::styling::{eprintln, println, ERROR, RESET};
use bar::BarError;

mod cli;

use cli::{Cli, Commands, DiffFormatArg, LogFormatArg, StatusFormatArg, TaskCommand};

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "off",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if cli.no_color {
        anstream::ColorChoice::Never.write_global();
    }

    if let Err(err) = run(cli.command) {
        report_error(&err);
        process::exit(exit_code(&err));
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    let cwd = cli::cwd()?;

    if matches!(&command, Commands::Init { .. } | Commands::Version) {
        return match command {
            Commands::Init { force } => commands::handle_init(&cwd, force),
            Commands::Version => {
                println!("bar {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            _ => unreachable!(),
        };
    }

    let ctx = Context::discover(&cwd)?;
    bar::command_log::init(&ctx.bar_dir.join("logs"));

    match command {
        Commands::Init { .. } | Commands::Version => unreachable!(),
        Commands::Task { action } => match action {
            TaskCommand::Start { name, base, no_switch } => {
                commands::handle_task_start(&ctx, &name, base.as_deref(), no_switch)
            }
            TaskCommand::List { all } => commands::handle_task_list(&ctx, all),
            TaskCommand::Switch { id_or_name } => commands::handle_task_switch(&ctx, &id_or_name),
            TaskCommand::Close { id, keep, delete, force } => {
                commands::handle_task_close(&ctx, id.as_deref(), keep, delete, force)
            }
        },
        Commands::Run { argv, timeout, no_record, env, cwd: sub_cwd } => commands::handle_run(
            &ctx,
            RunArgs { argv: &argv, timeout, no_record, env: &env, cwd: sub_cwd.as_deref() },
        ),
        Commands::Wrap { argv, no_ui, port } => {
            commands::handle_wrap(&ctx, WrapArgs { argv: &argv, no_ui, port })
        }
        Commands::Diff { step, stat, output, format } => commands::handle_diff(
            &ctx,
            DiffArgs {
                step: step.as_deref(),
                stat,
                output: output.as_deref(),
                format: match format {
                    DiffFormatArg::Patch => DiffFormat::Patch,
                    DiffFormatArg::Stat => DiffFormat::Stat,
                    DiffFormatArg::Json => DiffFormat::Json,
                },
            },
        ),
        Commands::Apply { message, no_close } => {
            commands::handle_apply(&ctx, message.as_deref(), no_close)
        }
        Commands::Rollback { base, hard, step } => {
            commands::handle_rollback(&ctx, RollbackArgs { base, hard, step: step.as_deref() })
        }
        Commands::Status { format } => commands::handle_status(
            &ctx,
            match format {
                StatusFormatArg::Text => StatusFormat::Text,
                StatusFormatArg::Json => StatusFormat::Json,
            },
        ),
        Commands::Log { step, limit, format, output } => commands::handle_log(
            &ctx,
            LogArgs {
                step: step.as_deref(),
                limit,
                format: match format {
                    LogFormatArg::Table => LogFormat::Table,
                    LogFormatArg::Json => LogFormat::Json,
                    LogFormatArg::Markdown => LogFormat::Markdown,
                },
                output: output.as_deref(),
            },
        ),
        Commands::Ui { port, no_open } => commands::handle_ui(&ctx, port, no_open),
        Commands::Update { check } => commands::handle_update(check),
    }
}

fn report_error(err: &anyhow::Error) {
    match BarError::downcast(err) {
        Some(bar_err) => eprintln!("{bar_err}"),
        None => eprintln!("{ERROR}error:{RESET} {err}"),
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    BarError::downcast(err).map(|e| e.code.exit_code()).unwrap_or(1)
}
