//! `bar status` — a one-shot summary of the active task.

use crate::styling::{hint_message, println};

use super::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFormat {
    Text,
    Json,
}

pub fn handle_status(ctx: &Context, format: StatusFormat) -> anyhow::Result<()> {
    let active = ctx.tasks.get_active()?;

    let Some(task) = active else {
        match format {
            StatusFormat::Json => println!("{}", serde_json::json!({ "active_task": null })),
            StatusFormat::Text => println!("{}", hint_message("no active task")),
        }
        return Ok(());
    };

    let clean = crate::workspace::is_clean(&task.workspace_path)?;
    let ledger = crate::ledger::Ledger::at(&ctx.tasks.task_dir(&task.id));
    let step_count = ledger.list()?.len();

    match format {
        StatusFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "task_id": task.id,
                    "name": task.name,
                    "branch": task.branch,
                    "base_ref": task.base_ref,
                    "workspace": task.workspace_path,
                    "clean": clean,
                    "step_count": step_count,
                })
            );
        }
        StatusFormat::Text => {
            println!("task:      {} ({})", task.id, task.name);
            println!("branch:    {}", task.branch);
            println!("base:      {}", task.base_ref);
            println!("workspace: {}", task.workspace_path.display());
            println!("clean:     {clean}");
            println!("steps:     {step_count}");
        }
    }
    Ok(())
}
