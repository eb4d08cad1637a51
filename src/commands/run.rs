//! `bar run` and `bar wrap` — the orchestrator compositions that turn a
//! child process invocation into an audited ledger step.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::BarError;
use crate::exec::{self, RunOptions};
use crate::ledger::{Artifacts, Ledger, RunStep, Step, StepKind};
use crate::policy::Policy;
use crate::styling::{info_message, warning_message, println};
use crate::task::{Task, TaskStatus};

use super::Context;

fn well_known_env(task: &Task) -> HashMap<String, String> {
    let mut env = HashMap::new();
    env.insert("BAR_ACTIVE".into(), "true".into());
    env.insert("BAR_TASK_ID".into(), task.id.clone());
    env.insert("BAR_TASK_NAME".into(), task.name.clone());
    env.insert("BAR_WORKSPACE".into(), task.workspace_path.to_string_lossy().into_owned());
    env.insert("BAR_BASE_REF".into(), task.base_ref.clone());
    env.insert("BAR_REPO_ROOT".into(), task.repo_root.to_string_lossy().into_owned());
    env
}

fn active_task(ctx: &Context) -> anyhow::Result<Task> {
    let task = ctx.tasks.get_active()?.ok_or_else(BarError::no_active_task)?;
    if task.status != TaskStatus::Active {
        return Err(BarError::no_active_task().into());
    }
    Ok(task)
}

fn load_policy(ctx: &Context) -> anyhow::Result<Option<Policy>> {
    if !ctx.config.policy.enabled {
        return Ok(None);
    }
    let path = ctx.config.policy_path(&ctx.repo_root);
    if path.exists() {
        Ok(Some(Policy::load(&path)?))
    } else {
        Ok(Some(Policy::default_rules()))
    }
}

fn resolve_cwd(workspace: &std::path::Path, relative: Option<&str>) -> PathBuf {
    match relative {
        Some(rel) => workspace.join(rel),
        None => workspace.to_path_buf(),
    }
}

pub struct RunArgs<'a> {
    pub argv: &'a [String],
    pub timeout: Option<Duration>,
    pub no_record: bool,
    pub env: &'a [(String, String)],
    pub cwd: Option<&'a str>,
}

pub fn handle_run(ctx: &Context, args: RunArgs<'_>) -> anyhow::Result<()> {
    let task = active_task(ctx)?;

    let mut env = well_known_env(&task);
    for (k, v) in args.env {
        env.insert(k.clone(), v.clone());
    }

    let policy_events = if let Some(policy) = load_policy(ctx)? {
        let check = policy.check(args.argv)?;
        if !check.allowed {
            let event = check.first_block().expect("allowed=false implies a block event");
            return Err(BarError::policy_violation(&event.rule_name, &event.reason).into());
        }
        for event in &check.events {
            if event.action == "warn" {
                println!("{}", warning_message(format!("{}: {}", event.rule_name, event.reason)));
            }
        }
        check.events
    } else {
        Vec::new()
    };

    let cwd = resolve_cwd(&task.workspace_path, args.cwd);
    let opts = RunOptions { cwd: Some(cwd.clone()), env, timeout: args.timeout, inherit_stdio: false };
    let result = exec::run(args.argv, &opts)?;

    let policy_verdict = policy_events
        .first()
        .map(|event| format!("{}:{}", event.rule_name, event.action));
    crate::command_log::log_command(
        "run",
        &args.argv.join(" "),
        result.exit_code,
        Some(result.duration),
        policy_verdict.as_deref(),
    );

    if args.no_record {
        println!("{}", info_message(format!("exit code: {}", result.exit_code.unwrap_or(-1))));
        return Ok(());
    }

    let task_dir = ctx.tasks.task_dir(&task.id);
    let _guard = ctx.tasks.lock(&task.id)?;
    let ledger = Ledger::at(&task_dir);
    let step_id = ledger.next_step_id()?;

    let workspace_repo = crate::git::Repository::at(&task.workspace_path);
    let diff = crate::diff::generate(&workspace_repo, &task.base_ref)?;

    let patch_path = task_dir.join("artifacts").join(format!("{step_id}.patch"));
    let output_path = task_dir.join("artifacts").join(format!("{step_id}.output"));
    exec::write_artifact(&patch_path, diff.patch.as_bytes())?;
    exec::write_artifact(&output_path, &exec::frame_output(&result.stdout, &result.stderr))?;

    let now = crate::utils::now();
    let step = Step {
        step_id: step_id.clone(),
        started_at: now - chrono::Duration::from_std(result.duration).unwrap_or_default(),
        ended_at: now,
        duration_ms: result.duration.as_millis() as u64,
        kind: StepKind::Run(RunStep {
            argv: args.argv.to_vec(),
            cwd: cwd.to_string_lossy().into_owned(),
            env: None,
            exit_code: result.exit_code,
            diff_stat: diff.stat,
            artifacts: Artifacts {
                patch: Some(format!("artifacts/{step_id}.patch")),
                output: Some(format!("artifacts/{step_id}.output")),
            },
            policy_events,
        }),
    };
    ledger.append(&step)?;

    println!(
        "{}",
        info_message(format!("step {step_id}: exit code {}", result.exit_code.unwrap_or(-1)))
    );
    Ok(())
}

pub struct WrapArgs<'a> {
    pub argv: &'a [String],
    pub no_ui: bool,
    pub port: u16,
}

/// Like `run`, but the child is interactive (stdio inherited) and the
/// step is suppressed entirely when the resulting diff is empty.
pub fn handle_wrap(ctx: &Context, args: WrapArgs<'_>) -> anyhow::Result<()> {
    let task = active_task(ctx)?;
    let env = well_known_env(&task);

    let ui_handle = if !args.no_ui {
        Some(super::ui::spawn_background(ctx, &task, args.port)?)
    } else {
        None
    };

    let opts = RunOptions {
        cwd: Some(task.workspace_path.clone()),
        env,
        timeout: None,
        inherit_stdio: true,
    };
    let result = exec::run(args.argv, &opts)?;

    crate::command_log::log_command(
        "wrap",
        &args.argv.join(" "),
        result.exit_code,
        Some(result.duration),
        None,
    );

    if let Some(handle) = ui_handle {
        handle.shutdown();
    }

    let workspace_repo = crate::git::Repository::at(&task.workspace_path);
    let diff = crate::diff::generate(&workspace_repo, &task.base_ref)?;
    if diff.stat.files == 0 {
        println!("{}", info_message("no changes; step not recorded"));
        return Ok(());
    }

    let task_dir = ctx.tasks.task_dir(&task.id);
    let _guard = ctx.tasks.lock(&task.id)?;
    let ledger = Ledger::at(&task_dir);
    let step_id = ledger.next_step_id()?;

    let patch_path = task_dir.join("artifacts").join(format!("{step_id}.patch"));
    exec::write_artifact(&patch_path, diff.patch.as_bytes())?;

    let now = crate::utils::now();
    let step = Step {
        step_id: step_id.clone(),
        started_at: now - chrono::Duration::from_std(result.duration).unwrap_or_default(),
        ended_at: now,
        duration_ms: result.duration.as_millis() as u64,
        kind: StepKind::Run(RunStep {
            argv: args.argv.to_vec(),
            cwd: task.workspace_path.to_string_lossy().into_owned(),
            env: None,
            exit_code: result.exit_code,
            diff_stat: diff.stat,
            artifacts: Artifacts { patch: Some(format!("artifacts/{step_id}.patch")), output: None },
            policy_events: Vec::new(),
        }),
    };
    ledger.append(&step)?;

    println!("{}", info_message(format!("step {step_id}: interactive session recorded")));
    Ok(())
}
