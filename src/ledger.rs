//! Append-only, per-task ledger of audited steps.
//!
//! The ledger is a line-delimited JSON file (`ledger.jsonl`): one
//! serialised [`Step`] per line, written with an explicit flush+sync so a
//! crash mid-write leaves at worst a malformed trailing line, never a
//! corrupted earlier record. This mirrors the corpus's always-on
//! [`crate::command_log`] rotation strategy, scaled down to "never
//! rotate, never truncate" because a ledger is the audit trail itself.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::DiffStat;
use crate::error::BarError;
use crate::policy::Event as PolicyEvent;
use crate::utils::{format_step_id, parse_step_id};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStep {
    pub argv: Vec<String>,
    pub cwd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    pub exit_code: Option<i32>,
    pub diff_stat: DiffStat,
    pub artifacts: Artifacts,
    #[serde(default)]
    pub policy_events: Vec<PolicyEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyStep {
    pub mode: String,
    pub commit_sha: String,
    pub commit_message: String,
    pub target_branch: String,
    /// Which branch of the apply transaction was taken — `fast-forward`
    /// or `cherry-pick`. Supplements the base spec, which left this
    /// ambiguous; see SPEC_FULL.md §9.
    pub transition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackStep {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_step: Option<String>,
    pub hard: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Artifacts {
    pub fn none() -> Self {
        Artifacts { patch: None, output: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepKind {
    Run(RunStep),
    Apply(ApplyStep),
    Rollback(RollbackStep),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub kind: StepKind,
}

/// A per-task append-only ledger at `<task_dir>/ledger.jsonl`.
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn at(task_dir: &Path) -> Self {
        Self { path: task_dir.join("ledger.jsonl") }
    }

    /// Ensure the ledger file exists (empty), so later appends never need
    /// to create parent directories.
    pub fn touch(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }

    /// Append `step` as one JSON line, flushing (and fsync'ing) before
    /// returning so the write is durable once this call succeeds.
    pub fn append(&self, step: &Step) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut line = serde_json::to_string(step)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    /// Scan the ledger top to bottom. Absence of the file is treated as
    /// an empty ledger, not an error; a malformed line aborts the read.
    pub fn list(&self) -> anyhow::Result<Vec<Step>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&self.path)?;
        let reader = std::io::BufReader::new(file);
        let mut steps = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let step: Step = serde_json::from_str(&line).map_err(|e| {
                BarError::command_failed(format!(
                    "corrupt ledger line {} in {}: {e}",
                    line_no + 1,
                    self.path.display()
                ))
            })?;
            steps.push(step);
        }

        Ok(steps)
    }

    pub fn get_by_id(&self, step_id: &str) -> anyhow::Result<Option<Step>> {
        Ok(self.list()?.into_iter().find(|s| s.step_id == step_id))
    }

    pub fn get_last(&self) -> anyhow::Result<Option<Step>> {
        Ok(self.list()?.into_iter().last())
    }

    /// The step id to use for the next append: `0001` if the ledger is
    /// empty, otherwise the successor of the last step's numeric id.
    ///
    /// Callers must hold the task's advisory lock (see [`crate::task::TaskLock`])
    /// across the read-then-append sequence to avoid two processes
    /// computing the same id.
    pub fn next_step_id(&self) -> anyhow::Result<String> {
        match self.get_last()? {
            None => Ok(format_step_id(1)),
            Some(last) => {
                let n = parse_step_id(&last.step_id).ok_or_else(|| {
                    BarError::command_failed(format!(
                        "ledger step id `{}` is not numeric",
                        last.step_id
                    ))
                })?;
                Ok(format_step_id(n + 1))
            }
        }
    }
}
