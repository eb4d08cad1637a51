//! `bar rollback` — discard a task's outstanding changes back to its
//! base ref.
//!
//! Step-level rollback (restoring to an arbitrary past step rather than
//! the base ref) is left unimplemented; see SPEC_FULL.md §9's
//! "rollback to step" open question — `--step` is accepted so the flag
//! parses, but any invocation that isn't `--base` is rejected.

use crate::error::BarError;
use crate::ledger::{Ledger, RollbackStep, Step, StepKind};
use crate::styling::{success_message, println};

use super::Context;

pub struct RollbackArgs<'a> {
    pub base: bool,
    pub hard: bool,
    pub step: Option<&'a str>,
}

pub fn handle_rollback(ctx: &Context, args: RollbackArgs<'_>) -> anyhow::Result<()> {
    if !args.base {
        return Err(BarError::rollback_failed(
            "rollback to an arbitrary step is not supported; pass --base",
        )
        .into());
    }
    if args.step.is_some() {
        return Err(BarError::rollback_failed("--step cannot be combined with --base").into());
    }

    let task = ctx.tasks.get_active()?.ok_or_else(BarError::no_active_task)?;

    crate::workspace::reset(&task.workspace_path, &task.base_ref, args.hard)?;

    let task_dir = ctx.tasks.task_dir(&task.id);
    let _guard = ctx.tasks.lock(&task.id)?;
    let ledger = Ledger::at(&task_dir);
    let step_id = ledger.next_step_id()?;
    let now = crate::utils::now();
    let step = Step {
        step_id: step_id.clone(),
        started_at: now,
        ended_at: now,
        duration_ms: 0,
        kind: StepKind::Rollback(RollbackStep {
            target: "base".into(),
            target_step: None,
            hard: args.hard,
        }),
    };
    ledger.append(&step)?;

    println!("{}", success_message(format!("rolled back task {} to {} (step {step_id})", task.id, task.base_ref)));
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
    fn rollback_without_base_flag_is_rejected() {
        let (_fixture, ctx, _task) = setup();
        let result = handle_rollback(&ctx, RollbackArgs { base: false, hard: false, step: None });
        assert!(result.is_err());
    }

    #[test]
    fn rollback_with_step_and_base_is_rejected() {
        let (_fixture, ctx, _task) = setup();
        let result = handle_rollback(&ctx, RollbackArgs { base: true, hard: false, step: Some("0001") });
        assert!(result.is_err());
    }

    #[test]
    fn rollback_base_discards_changes_and_records_step() {
        let (_fixture, ctx, task) = setup();
        std::fs::write(task.workspace_path.join("README.md"), "dirty\n").unwrap();
        std::fs::write(task.workspace_path.join("new.txt"), "new\n").unwrap();

        handle_rollback(&ctx, RollbackArgs { base: true, hard: true, step: None }).unwrap();

        assert!(crate::workspace::is_clean(&task.workspace_path).unwrap());
        assert!(!task.workspace_path.join("new.txt").exists());

        let ledger = Ledger::at(&ctx.tasks.task_dir(&task.id));
        let steps = ledger.list().unwrap();
        assert_eq!(steps.len(), 1);
        let StepKind::Rollback(rb) = &steps[0].kind else { panic!("expected rollback step") };
        assert_eq!(rb.target, "base");
        assert!(rb.hard);

        let reloaded = ctx.tasks.get(&task.id).unwrap();
        assert_eq!(reloaded.status, crate::task::TaskStatus::Active);
    }

    #[test]
    fn rollback_base_without_hard_preserves_untracked_files() {
        let (_fixture, ctx, task) = setup();
        std::fs::write(task.workspace_path.join("README.md"), "dirty\n").unwrap();
        std::fs::write(task.workspace_path.join("new.txt"), "new\n").unwrap();

        handle_rollback(&ctx, RollbackArgs { base: true, hard: false, step: None }).unwrap();

        assert_eq!(
            std::fs::read_to_string(task.workspace_path.join("README.md")).unwrap(),
            "hello\n"
        );
        assert!(task.workspace_path.join("new.txt").exists());

        let ledger = Ledger::at(&ctx.tasks.task_dir(&task.id));
        let steps = ledger.list().unwrap();
        let StepKind::Rollback(rb) = &steps[0].kind else { panic!("expected rollback step") };
        assert!(!rb.hard);
    }
}
