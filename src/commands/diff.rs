//! `bar diff` — show what a task has changed, either live or as
//! recorded by a past step.

use crate::error::BarError;
use crate::ledger::{Ledger, StepKind};
use crate::styling::println;

use super::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffFormat {
    Patch,
    Stat,
    Json,
}

pub struct DiffArgs<'a> {
    pub step: Option<&'a str>,
    pub stat: bool,
    pub output: Option<&'a str>,
    pub format: DiffFormat,
}

pub fn handle_diff(ctx: &Context, args: DiffArgs<'_>) -> anyhow::Result<()> {
    let task = ctx.tasks.get_active()?.ok_or_else(BarError::no_active_task)?;
    let task_dir = ctx.tasks.task_dir(&task.id);

    let (patch, stat_line) = match args.step {
        Some(step_id) => {
            let ledger = Ledger::at(&task_dir);
            let step = ledger.get_by_id(step_id)?.ok_or_else(|| BarError::step_not_found(step_id))?;
            let StepKind::Run(run) = &step.kind else {
                return Err(BarError::patch_not_found(step_id).into());
            };
            let Some(rel_path) = &run.artifacts.patch else {
                return Err(BarError::patch_not_found(step_id).into());
            };
            let patch_path = task_dir.join(rel_path);
            if !patch_path.exists() {
                return Err(BarError::patch_not_found(step_id).into());
            }
            let patch = std::fs::read_to_string(&patch_path)?;
            (patch, format!("{:?}", run.diff_stat))
        }
        None => {
            let repo = crate::git::Repository::at(&task.workspace_path);
            let diff = crate::diff::generate(&repo, &task.base_ref)?;
            (diff.patch, format!("{:?}", diff.stat))
        }
    };

    let rendered = match args.format {
        DiffFormat::Patch if !args.stat => patch,
        DiffFormat::Stat => stat_line,
        DiffFormat::Json => serde_json::to_string_pretty(&serde_json::json!({ "patch": patch }))?,
        _ => stat_line,
    };

    match args.output {
        Some(path) => std::fs::write(path, rendered)?,
        None => println!("{rendered}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_repo::TestRepo;

    fn setup() -> (TestRepo, Context, crate::task::Task) {
        let fixture = TestRepo::new();
        let bar_dir = fixture.dir.path().join(".bar");
        std::fs::create_dir_all(bar_dir.join("tasks")).unwrap();
        std::fs::create_dir_all(bar_dir.join("workspaces")).unwrap();
        crate::config::Config::default().save(&bar_dir).unwrap();

        let ctx = Context {
            repo_root: fixture.dir.path().to_path_buf(),
            bar_dir: bar_dir.clone(),
            config: crate::config::Config::default(),
            tasks: crate::task::TaskManager::new(bar_dir),
        };

        let task_id = ctx.tasks.new_task_id();
        let branch = crate::task::branch_name(&ctx.config.git.branch_prefix, "t", &task_id);
        let ws = crate::workspace::workspace_path(&ctx.bar_dir, &task_id);
        crate::workspace::create(&ctx.repo(), &ctx.bar_dir, &task_id, &branch, "main").unwrap();
        crate::ledger::Ledger::at(&ctx.tasks.task_dir(&task_id)).touch().unwrap();
        std::fs::create_dir_all(ctx.tasks.task_dir(&task_id).join("artifacts")).unwrap();
        let task = ctx.tasks.create(&task_id, "t", &ctx.repo_root, "main", &branch, ws).unwrap();
        ctx.tasks.set_active(&task_id).unwrap();

        (fixture, ctx, task)
    }

    #[test]
    fn live_diff_on_clean_workspace_is_empty() {
        let (_fixture, ctx, _task) = setup();
        let tmp = tempfile::tempdir().unwrap();
        let output_path = tmp.path().join("out.patch");
        handle_diff(
            &ctx,
            DiffArgs { step: None, stat: false, output: Some(output_path.to_str().unwrap()), format: DiffFormat::Patch },
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(output_path).unwrap(), "");
    }

    #[test]
    fn unknown_step_is_step_not_found() {
        let (_fixture, ctx, _task) = setup();
        let result = handle_diff(&ctx, DiffArgs { step: Some("9999"), stat: false, output: None, format: DiffFormat::Patch });
        assert!(result.is_err());
    }

    #[test]
    fn no_active_task_errors() {
        let fixture = TestRepo::new();
        let bar_dir = fixture.dir.path().join(".bar");
        std::fs::create_dir_all(bar_dir.join("tasks")).unwrap();
        let ctx = Context {
            repo_root: fixture.dir.path().to_path_buf(),
            bar_dir: bar_dir.clone(),
            config: crate::config::Config::default(),
            tasks: crate::task::TaskManager::new(bar_dir),
        };
        let result = handle_diff(&ctx, DiffArgs { step: None, stat: false, output: None, format: DiffFormat::Patch });
        assert!(result.is_err());
    }
}
