//! Structured error type for user-facing failures.
//!
//! Mirrors the corpus convention of a domain error enum with a styled
//! `Display` impl rather than ad-hoc `anyhow!` strings at the boundary: every
//! error the CLI surfaces to a user carries a machine-readable code (used to
//! pick a process exit status and, eventually, to let callers match on
//! failure kind), a message, and an optional actionable hint.

use std::fmt;

use crate::styling::{ERROR, ERROR_EMOJI, HINT, HINT_EMOJI, RESET};

/// Machine-readable failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotInitialized,
    NoActiveTask,
    TaskNotFound,
    StepNotFound,
    PatchNotFound,
    WorkspaceNotClean,
    PolicyViolation,
    NotGitRepo,
    GitOperation,
    CommandFailed,
    RollbackFailed,
    UpdateFailed,
}

impl ErrorCode {
    /// Stable string form, used in `--format json` error output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotInitialized => "NOT_INITIALIZED",
            ErrorCode::NoActiveTask => "NO_ACTIVE_TASK",
            ErrorCode::TaskNotFound => "TASK_NOT_FOUND",
            ErrorCode::StepNotFound => "STEP_NOT_FOUND",
            ErrorCode::PatchNotFound => "PATCH_NOT_FOUND",
            ErrorCode::WorkspaceNotClean => "WORKSPACE_NOT_CLEAN",
            ErrorCode::PolicyViolation => "POLICY_VIOLATION",
            ErrorCode::NotGitRepo => "NOT_GIT_REPO",
            ErrorCode::GitOperation => "GIT_OPERATION",
            ErrorCode::CommandFailed => "COMMAND_FAILED",
            ErrorCode::RollbackFailed => "ROLLBACK_FAILED",
            ErrorCode::UpdateFailed => "UPDATE_FAILED",
        }
    }

    /// Process exit code a top-level handler should use for this failure.
    ///
    /// All current codes map to the same non-zero status; kept as a method
    /// (rather than a bare constant) so a future code can diverge without
    /// touching call sites.
    pub fn exit_code(self) -> i32 {
        1
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-facing error: code + message + optional hint + optional cause.
#[derive(Debug)]
pub struct BarError {
    pub code: ErrorCode,
    pub message: String,
    pub hint: Option<String>,
    cause: Option<anyhow::Error>,
}

impl BarError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
            cause: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_cause(mut self, cause: anyhow::Error) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Look for a `BarError` anywhere in an `anyhow::Error`'s cause chain.
    pub fn downcast(err: &anyhow::Error) -> Option<&BarError> {
        err.chain().find_map(|cause| cause.downcast_ref::<BarError>())
    }
}

impl fmt::Display for BarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ERROR_EMOJI} {ERROR}{}{RESET}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n\n{HINT_EMOJI} {HINT}{hint}{RESET}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|e| e.as_ref())
    }
}

/// Convenience constructors, one per code, matching §7 of the spec.
impl BarError {
    pub fn not_initialized() -> Self {
        Self::new(ErrorCode::NotInitialized, "bar has not been initialized in this repository")
            .with_hint("Run `bar init` first")
    }

    pub fn no_active_task() -> Self {
        Self::new(ErrorCode::NoActiveTask, "no active task")
            .with_hint("Run `bar task start <name>` or `bar task switch <id>`")
    }

    pub fn task_not_found(id_or_name: &str) -> Self {
        Self::new(ErrorCode::TaskNotFound, format!("task not found: {id_or_name}"))
    }

    pub fn step_not_found(step_id: &str) -> Self {
        Self::new(ErrorCode::StepNotFound, format!("step not found: {step_id}"))
    }

    pub fn patch_not_found(step_id: &str) -> Self {
        Self::new(ErrorCode::PatchNotFound, format!("no patch artifact for step {step_id}"))
    }

    pub fn workspace_not_clean(path: &std::path::Path) -> Self {
        Self::new(
            ErrorCode::WorkspaceNotClean,
            format!("workspace is not clean: {}", path.display()),
        )
        .with_hint("Commit, stash, or discard changes first")
    }

    pub fn policy_violation(rule: &str, reason: &str) -> Self {
        Self::new(ErrorCode::PolicyViolation, format!("blocked by policy rule `{rule}`: {reason}"))
    }

    pub fn not_git_repo() -> Self {
        Self::new(ErrorCode::NotGitRepo, "not inside a git repository")
    }

    pub fn git_operation(context: &str, stderr: &str) -> Self {
        Self::new(ErrorCode::GitOperation, format!("git {context} failed: {}", stderr.trim()))
    }

    pub fn command_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CommandFailed, message)
    }

    pub fn rollback_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::RollbackFailed, message)
    }

    pub fn update_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpdateFailed, message)
    }
}
