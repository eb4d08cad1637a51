//! Workspace manager: creates and tears down the isolated worktree a
//! task runs in.
//!
//! A task's workspace is a `git worktree` checked out onto its own
//! branch, living under the repo's storage root (see [`crate::path`]) —
//! never inside the main working tree. This is the one place that
//! decides *where* a worktree lives; [`crate::git::Repository`] still
//! owns the actual `git worktree` plumbing.

use std::path::{Path, PathBuf};

use crate::error::BarError;
use crate::git::Repository;

/// Directory name, under the storage root, holding all task worktrees.
const WORKSPACES_DIR: &str = "workspaces";

pub fn workspace_path(storage_root: &Path, task_id: &str) -> PathBuf {
    storage_root.join(WORKSPACES_DIR).join(task_id)
}

/// Create a worktree for `task_id` off `base_ref`, on a new `branch`.
///
/// `repo` must be the main repository (not an existing worktree);
/// `base_ref` is resolved first so a typo'd ref fails before any
/// filesystem state is created.
pub fn create(
    repo: &Repository,
    storage_root: &Path,
    task_id: &str,
    branch: &str,
    base_ref: &str,
) -> anyhow::Result<PathBuf> {
    repo.resolve_ref(base_ref)?;
    let path = workspace_path(storage_root, task_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    repo.worktree_add(&path, branch, base_ref)?;
    Ok(path)
}

/// Remove a task's worktree. Safe to call on an already-removed path.
pub fn delete(repo: &Repository, workspace: &Path) -> anyhow::Result<()> {
    if !workspace.exists() {
        return Ok(());
    }
    repo.worktree_remove(workspace)
}

pub fn is_clean(workspace: &Path) -> anyhow::Result<bool> {
    Repository::at(workspace).is_clean()
}

/// Reset a workspace's tracked files back to `base_ref`. When `hard` is
/// true, untracked files and directories are also removed; when false,
/// they're left in place.
pub fn reset(workspace: &Path, base_ref: &str, hard: bool) -> anyhow::Result<()> {
    let ws_repo = Repository::at(workspace);
    ws_repo.reset_hard(base_ref)?;
    if hard {
        ws_repo.clean_fd()?;
    }
    Ok(())
}

/// Guard used before any destructive operation (`reset`, `apply`) that
/// requires the caller to have already decided uncommitted changes are
/// acceptable to lose, or the tree to already be clean.
pub fn require_clean(workspace: &Path) -> anyhow::Result<()> {
    if !is_clean(workspace)? {
        return Err(BarError::workspace_not_clean(workspace).into());
    }
    Ok(())
}
