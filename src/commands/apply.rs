//! `bar apply` — land a task's changes onto its base ref.

use crate::apply::{self, ApplyResult};
use crate::error::BarError;
use crate::ledger::{ApplyStep, Ledger, Step, StepKind};
use crate::styling::{success_message, println};

use super::Context;

pub fn handle_apply(ctx: &Context, message: Option<&str>, no_close: bool) -> anyhow::Result<()> {
    let task = ctx.tasks.get_active()?.ok_or_else(BarError::no_active_task)?;
    let message = message.unwrap_or_default();

    let repo_root = ctx.repo();
    let workspace = crate::git::Repository::at(&task.workspace_path);

    let ApplyResult { commit_sha, branch, transition } =
        apply::apply(&repo_root, &workspace, &task.base_ref, &task.branch, message)?;

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
        kind: StepKind::Apply(ApplyStep {
            mode: "commit".into(),
            commit_sha,
            commit_message: if message.is_empty() { apply::DEFAULT_MESSAGE.to_string() } else { message.to_string() },
            target_branch: task.base_ref.clone(),
            transition: transition.as_str().to_string(),
        }),
    };
    ledger.append(&step)?;
    drop(_guard);

    if !no_close {
        let closed = ctx.tasks.close_and_clear(&task.id)?;
        crate::workspace::delete(&repo_root, &closed.workspace_path)?;
    }

    println!(
        "{}",
        success_message(format!("applied task {} onto {} via {} (step {step_id}, from {branch})", task.id, task.base_ref, transition.as_str()))
    );
    Ok(())
}
