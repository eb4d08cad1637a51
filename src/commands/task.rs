//! `bar task start|list|switch|close`.

use crate::error::BarError;
use crate::styling::{info_message, success_message, println};
use crate::task::{branch_name, TaskStatus};
use crate::workspace;

use super::Context;

pub fn handle_task_start(
    ctx: &Context,
    name: &str,
    base: Option<&str>,
    no_switch: bool,
) -> anyhow::Result<()> {
    let base_ref = base.unwrap_or(&ctx.config.git.default_base);
    let repo = ctx.repo();

    let task_id = ctx.tasks.new_task_id();
    let branch = branch_name(&ctx.config.git.branch_prefix, name, &task_id);
    let workspace_path = workspace::workspace_path(&ctx.bar_dir, &task_id);
    workspace::create(&repo, &ctx.bar_dir, &task_id, &branch, base_ref)?;

    let ledger = crate::ledger::Ledger::at(&ctx.tasks.task_dir(&task_id));
    ledger.touch()?;
    std::fs::create_dir_all(ctx.tasks.task_dir(&task_id).join("artifacts"))?;

    ctx.tasks.create(&task_id, name, &ctx.repo_root, base_ref, &branch, workspace_path)?;

    if !no_switch {
        ctx.tasks.set_active(&task_id)?;
    }

    println!(
        "{}",
        success_message(format!(
            "Started task {task_id} ({name}) on branch {branch}"
        ))
    );
    Ok(())
}

pub fn handle_task_list(ctx: &Context, all: bool) -> anyhow::Result<()> {
    let active = ctx.tasks.get_active()?.map(|t| t.id);
    let tasks = ctx.tasks.list()?;
    for task in tasks {
        if !all && task.status != TaskStatus::Active {
            continue;
        }
        let marker = if Some(&task.id) == active.as_ref() { "*" } else { " " };
        println!("{marker} {} {} [{:?}] {}", task.id, task.name, task.status, task.branch);
    }
    Ok(())
}

pub fn handle_task_switch(ctx: &Context, id_or_name: &str) -> anyhow::Result<()> {
    let task = ctx.tasks.resolve(id_or_name)?;
    if task.status != TaskStatus::Active {
        return Err(BarError::command_failed(format!(
            "task {} is closed and cannot be switched to",
            task.id
        ))
        .into());
    }
    ctx.tasks.set_active(&task.id)?;
    println!("{}", info_message(format!("Switched to task {} ({})", task.id, task.name)));
    Ok(())
}

pub fn handle_task_close(
    ctx: &Context,
    id: Option<&str>,
    keep: bool,
    delete: bool,
    force: bool,
) -> anyhow::Result<()> {
    let task = match id {
        Some(id) => ctx.tasks.resolve(id)?,
        None => ctx.tasks.get_active()?.ok_or_else(BarError::no_active_task)?,
    };

    if !force && !workspace::is_clean(&task.workspace_path)? {
        return Err(BarError::workspace_not_clean(&task.workspace_path).into());
    }

    let closed = ctx.tasks.close_and_clear(&task.id)?;

    if !keep {
        workspace::delete(&ctx.repo(), &closed.workspace_path)?;
    }
    if delete {
        ctx.tasks.delete(&closed.id)?;
    }

    println!("{}", success_message(format!("Closed task {}", closed.id)));
    Ok(())
}
