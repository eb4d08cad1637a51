//! `bar log` — render the ledger of a task, optionally filtered to one
//! step.

use crate::error::BarError;
use crate::ledger::{Ledger, Step, StepKind};
use crate::styling::println;

use super::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Table,
    Json,
    Markdown,
}

pub struct LogArgs<'a> {
    pub step: Option<&'a str>,
    pub limit: Option<usize>,
    pub format: LogFormat,
    pub output: Option<&'a str>,
}

fn kind_label(step: &Step) -> &'static str {
    match &step.kind {
        StepKind::Run(_) => "run",
        StepKind::Apply(_) => "apply",
        StepKind::Rollback(_) => "rollback",
    }
}

fn summary_line(step: &Step) -> String {
    match &step.kind {
        StepKind::Run(r) => format!(
            "{} exit={} files={}",
            r.argv.join(" "),
            r.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "?".into()),
            r.diff_stat.files
        ),
        StepKind::Apply(a) => format!("{} -> {} ({})", a.commit_sha, a.target_branch, a.transition),
        StepKind::Rollback(r) => format!("to {} (hard={})", r.target, r.hard),
    }
}

fn render_table(steps: &[Step]) -> String {
    let mut out = String::new();
    for step in steps {
        out.push_str(&format!(
            "{}  {}  {}  {}\n",
            step.step_id,
            step.started_at.to_rfc3339(),
            kind_label(step),
            summary_line(step)
        ));
    }
    out
}

fn render_markdown(steps: &[Step]) -> String {
    let mut out = String::from("| step | time | kind | summary |\n|---|---|---|---|\n");
    for step in steps {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            step.step_id,
            step.started_at.to_rfc3339(),
            kind_label(step),
            summary_line(step)
        ));
    }
    out
}

pub fn handle_log(ctx: &Context, args: LogArgs<'_>) -> anyhow::Result<()> {
    let task = ctx.tasks.get_active()?.ok_or_else(BarError::no_active_task)?;
    let ledger = Ledger::at(&ctx.tasks.task_dir(&task.id));

    let steps: Vec<Step> = match args.step {
        Some(id) => vec![ledger.get_by_id(id)?.ok_or_else(|| BarError::step_not_found(id))?],
        None => {
            let mut all = ledger.list()?;
            if let Some(limit) = args.limit {
                if all.len() > limit {
                    all = all.split_off(all.len() - limit);
                }
            }
            all
        }
    };

    let rendered = match args.format {
        LogFormat::Table => render_table(&steps),
        LogFormat::Markdown => render_markdown(&steps),
        LogFormat::Json => serde_json::to_string_pretty(&steps)?,
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
    use crate::diff::DiffStat;
    use crate::git::test_repo::TestRepo;
    use crate::ledger::{Artifacts, RunStep, StepKind as LSK};

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
        let ledger = Ledger::at(&ctx.tasks.task_dir(&task_id));
        ledger.touch().unwrap();
        let now = crate::utils::now();
        for i in 0..3 {
            let step = Step {
                step_id: crate::utils::format_step_id(i + 1),
                started_at: now,
                ended_at: now,
                duration_ms: 1,
                kind: LSK::Run(RunStep {
                    argv: vec!["echo".into()],
                    cwd: "/".into(),
                    env: None,
                    exit_code: Some(0),
                    diff_stat: DiffStat::default(),
                    artifacts: Artifacts::none(),
                    policy_events: vec![],
                }),
            };
            ledger.append(&step).unwrap();
        }

        let task = ctx.tasks.create(&task_id, "t", &ctx.repo_root, "main", &branch, ws).unwrap();
        ctx.tasks.set_active(&task_id).unwrap();
        (fixture, ctx, task)
    }

    #[test]
    fn log_without_step_lists_all_in_order() {
        let (_fixture, ctx, _task) = setup();
        handle_log(&ctx, LogArgs { step: None, limit: None, format: LogFormat::Table, output: None }).unwrap();
    }

    #[test]
    fn log_respects_limit() {
        let (_fixture, ctx, task) = setup();
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("log.json");
        handle_log(
            &ctx,
            LogArgs { step: None, limit: Some(1), format: LogFormat::Json, output: Some(out.to_str().unwrap()) },
        )
        .unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        let steps: Vec<Step> = serde_json::from_str(&text).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_id, "0003");
        let _ = task;
    }

    #[test]
    fn log_with_unknown_step_is_step_not_found() {
        let (_fixture, ctx, _task) = setup();
        let result = handle_log(&ctx, LogArgs { step: Some("9999"), limit: None, format: LogFormat::Table, output: None });
        assert!(result.is_err());
    }

    #[test]
    fn markdown_format_includes_table_header() {
        let (_fixture, ctx, _task) = setup();
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("log.md");
        handle_log(
            &ctx,
            LogArgs { step: None, limit: None, format: LogFormat::Markdown, output: Some(out.to_str().unwrap()) },
        )
        .unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("| step |"));
    }
}
