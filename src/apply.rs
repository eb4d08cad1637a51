//! Apply engine: moves the aggregate of a workspace's changes into the
//! base ref as a single new commit.
//!
//! The transaction boundary is exactly the five-step algorithm below —
//! nothing upstream (ledger append, workspace teardown, task close)
//! happens until this returns `Ok`.

use serde::{Deserialize, Serialize};

use crate::git::Repository;

pub const DEFAULT_MESSAGE: &str = "bar: apply changes";

/// Which branch of the apply transaction landed the commit on the base
/// ref. Distinguishing these was left ambiguous in the base spec; see
/// SPEC_FULL.md §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transition {
    FastForward,
    CherryPick,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::FastForward => "fast-forward",
            Transition::CherryPick => "cherry-pick",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApplyResult {
    pub commit_sha: String,
    pub branch: String,
    pub transition: Transition,
}

/// Run the apply algorithm: commit the workspace's outstanding changes,
/// then land them on `base_ref` in the repository root, preferring a
/// fast-forward and falling back to a cherry-pick when the base has
/// diverged.
///
/// `repo_root` and `workspace` must be the main repository and the
/// task's worktree respectively; `base_ref` and `branch` name the
/// target and source of the transaction.
pub fn apply(
    repo_root: &Repository,
    workspace: &Repository,
    base_ref: &str,
    branch: &str,
    message: &str,
) -> anyhow::Result<ApplyResult> {
    let message = if message.trim().is_empty() { DEFAULT_MESSAGE } else { message };

    workspace.add_all()?;
    workspace.commit(message)?;

    let commit_sha = workspace.rev_parse_head()?;
    let actual_branch = workspace.current_branch()?;

    let transition = match repo_root.fetch_local_ff(branch, base_ref) {
        Ok(()) => Transition::FastForward,
        Err(_) => {
            repo_root.checkout(base_ref)?;
            repo_root.cherry_pick(&commit_sha)?;
            Transition::CherryPick
        }
    };

    Ok(ApplyResult { commit_sha, branch: actual_branch, transition })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_repo::TestRepo;

    #[test]
    fn fast_forwards_when_base_has_not_moved() {
        let fixture = TestRepo::new();
        let repo_root = fixture.repo();
        let ws_dir = tempfile::tempdir().unwrap();
        let ws_path = ws_dir.path().join("wt");
        repo_root.worktree_add(&ws_path, "bar/t1", "main").unwrap();
        let workspace = Repository::at(&ws_path);

        std::fs::write(ws_path.join("feature.txt"), "hello\n").unwrap();
        let result = apply(&repo_root, &workspace, "main", "bar/t1", "").unwrap();

        assert_eq!(result.transition, Transition::FastForward);
        assert_eq!(repo_root.rev_parse_head().unwrap(), result.commit_sha);
    }

    #[test]
    fn cherry_picks_when_base_has_diverged() {
        let fixture = TestRepo::new();
        let repo_root = fixture.repo();

        let ws_dir = tempfile::tempdir().unwrap();
        let ws_path = ws_dir.path().join("wt");
        repo_root.worktree_add(&ws_path, "bar/t1", "main").unwrap();
        let workspace = Repository::at(&ws_path);
        std::fs::write(ws_path.join("feature.txt"), "hello\n").unwrap();

        // Diverge the base ref in the main repo before applying.
        std::fs::write(fixture.dir.path().join("unrelated.txt"), "other\n").unwrap();
        repo_root.add_all().unwrap();
        repo_root.commit("unrelated change").unwrap();

        let result = apply(&repo_root, &workspace, "main", "bar/t1", "").unwrap();
        assert_eq!(result.transition, Transition::CherryPick);
        assert!(fixture.dir.path().join("feature.txt").exists());
        assert!(fixture.dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn empty_message_uses_default() {
        let fixture = TestRepo::new();
        let repo_root = fixture.repo();
        let ws_dir = tempfile::tempdir().unwrap();
        let ws_path = ws_dir.path().join("wt");
        repo_root.worktree_add(&ws_path, "bar/t1", "main").unwrap();
        let workspace = Repository::at(&ws_path);
        std::fs::write(ws_path.join("feature.txt"), "hi\n").unwrap();

        apply(&repo_root, &workspace, "main", "bar/t1", "").unwrap();
        let log = workspace.run(&["log", "-1", "--pretty=%s"]).unwrap();
        assert_eq!(log, DEFAULT_MESSAGE);
    }

    #[test]
    fn nothing_to_commit_is_surfaced() {
        let fixture = TestRepo::new();
        let repo_root = fixture.repo();
        let ws_dir = tempfile::tempdir().unwrap();
        let ws_path = ws_dir.path().join("wt");
        repo_root.worktree_add(&ws_path, "bar/t1", "main").unwrap();
        let workspace = Repository::at(&ws_path);

        assert!(apply(&repo_root, &workspace, "main", "bar/t1", "").is_err());
    }
}
