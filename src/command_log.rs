//! Always-on audit logging of every child command `bar` runs.
//!
//! Distinct from the per-task [`crate::ledger`]: this log is process-wide,
//! lives at `<bar_dir>/logs/commands.jsonl`, and records every invocation
//! — policy-checked user commands from `run`/`wrap`, regardless of which
//! task is active — alongside the policy verdict that let it through. It
//! exists for post-hoc debugging across tasks, not as the source of truth
//! for any `bar` operation (the ledger is that).
//!
//! # Durability, not rotation
//!
//! Like [`crate::ledger`], this file is never rotated or truncated: an
//! audit trail that silently drops its own history on size pressure isn't
//! one. Each write is flushed and fsync'd before returning, matching the
//! ledger's own append contract, so a crash mid-write loses at most the
//! one in-flight line.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

const MAX_CMD_LENGTH: usize = 2000;

static COMMAND_LOG: OnceLock<Mutex<CommandLog>> = OnceLock::new();

struct CommandLog {
    log_path: PathBuf,
    file: Option<File>,
}

impl CommandLog {
    fn new(log_dir: &Path) -> Self {
        Self { log_path: log_dir.join("commands.jsonl"), file: None }
    }

    fn write(
        &mut self,
        label: &str,
        command: &str,
        exit_code: Option<i32>,
        duration: Option<Duration>,
        policy_verdict: Option<&str>,
    ) {
        if self.file.is_none() {
            if let Some(parent) = self.log_path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            self.file = OpenOptions::new().create(true).append(true).open(&self.log_path).ok();
        }

        let cmd_display = truncate_cmd(command);
        let ts = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let entry = serde_json::json!({
            "ts": ts,
            "label": label,
            "cmd": cmd_display,
            "exit": exit_code,
            "dur_ms": duration.map(|d| d.as_millis() as u64),
            "policy": policy_verdict,
        });

        let mut buf = entry.to_string();
        buf.push('\n');

        let Some(file) = self.file.as_mut() else {
            return;
        };
        if file.write_all(buf.as_bytes()).is_ok() {
            let _ = file.flush();
            let _ = file.sync_all();
        }
    }
}

/// Initialize the command log. Call once at startup with `<bar_dir>/logs`.
/// The log file is created lazily on first write.
pub fn init(log_dir: &Path) {
    let logger = CommandLog::new(log_dir);
    let _ = COMMAND_LOG.set(Mutex::new(logger));
}

/// Log one external command invocation.
///
/// `exit_code`/`duration` are `None` when the outcome is not yet known
/// (e.g. a background web UI process). `policy_verdict` is a short
/// `<rule-name>:<action>` summary of the policy event that let the
/// command run, or `None` when policy was disabled or raised no event.
pub fn log_command(
    label: &str,
    command: &str,
    exit_code: Option<i32>,
    duration: Option<Duration>,
    policy_verdict: Option<&str>,
) {
    let Some(mutex) = COMMAND_LOG.get() else { return };
    let Ok(mut logger) = mutex.lock() else { return };
    logger.write(label, command, exit_code, duration, policy_verdict);
}

fn truncate_cmd(command: &str) -> String {
    match command.char_indices().nth(MAX_CMD_LENGTH) {
        Some((byte_idx, _)) => {
            let mut s = command[..byte_idx].to_string();
            s.push('…');
            s
        }
        None => command.to_string(),
    }
}
