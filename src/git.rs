//! VCS adapter: a thin, synchronous façade over the `git` executable.
//!
//! This is the only module that shells out to `git`. Every other subsystem
//! goes through [`Repository::run`] (or the narrow helpers built on it), so
//! the exact subcommand vocabulary lives in one place.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use crate::error::BarError;

/// Resolve the `git` executable once via `$PATH`, falling back to the
/// bare name if resolution fails (lets `Command::new` produce its own
/// "not found" error rather than masking it here).
fn git_binary() -> &'static Path {
    static GIT_PATH: OnceLock<PathBuf> = OnceLock::new();
    GIT_PATH.get_or_init(|| which::which("git").unwrap_or_else(|_| PathBuf::from("git")))
}

/// A repository (or a worktree of one), addressed by its working directory.
#[derive(Debug, Clone)]
pub struct Repository {
    dir: PathBuf,
}

impl Repository {
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Run `git <args>` in this repository's directory, returning trimmed
    /// stdout on success. On a nonzero exit, returns a [`BarError::git_operation`]
    /// carrying the joined argv as context and the child's stderr text.
    pub fn run(&self, args: &[&str]) -> anyhow::Result<String> {
        log::debug!("$ git {} (in {})", args.join(" "), self.dir.display());

        let output = Command::new(git_binary())
            .args(args)
            .current_dir(&self.dir)
            .output()
            .map_err(|e| {
                BarError::git_operation(&args.join(" "), &format!("failed to spawn git: {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BarError::git_operation(&args.join(" "), &stderr).into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Like [`Self::run`] but returns raw (untrimmed) stdout bytes — used
    /// for patch bodies, where leading/trailing whitespace is meaningful.
    pub fn run_raw(&self, args: &[&str]) -> anyhow::Result<Vec<u8>> {
        log::debug!("$ git {} (in {})", args.join(" "), self.dir.display());

        let output = Command::new(git_binary())
            .args(args)
            .current_dir(&self.dir)
            .output()
            .map_err(|e| {
                BarError::git_operation(&args.join(" "), &format!("failed to spawn git: {e}"))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BarError::git_operation(&args.join(" "), &stderr).into());
        }

        Ok(output.stdout)
    }

    /// Read HEAD as (commit_hash, branch_name_or_empty).
    ///
    /// `branch` is empty when HEAD is detached.
    pub fn head(&self) -> anyhow::Result<(String, String)> {
        let hash = self.run(&["rev-parse", "HEAD"])?;
        let branch = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = if branch == "HEAD" { String::new() } else { branch };
        Ok((hash, branch))
    }

    /// `git status --porcelain`; empty output means a clean tree.
    pub fn status_porcelain(&self) -> anyhow::Result<String> {
        self.run(&["status", "--porcelain"])
    }

    pub fn is_clean(&self) -> anyhow::Result<bool> {
        Ok(self.status_porcelain()?.is_empty())
    }

    /// Create a worktree at `path` on a new branch `branch`, based at `base_ref`.
    pub fn worktree_add(&self, path: &Path, branch: &str, base_ref: &str) -> anyhow::Result<()> {
        let path_str = path.to_string_lossy().into_owned();
        self.run(&["worktree", "add", "-b", branch, &path_str, base_ref])?;
        Ok(())
    }

    pub fn worktree_remove(&self, path: &Path) -> anyhow::Result<()> {
        let path_str = path.to_string_lossy().into_owned();
        self.run(&["worktree", "remove", "--force", &path_str])?;
        Ok(())
    }

    pub fn reset_hard(&self, base_ref: &str) -> anyhow::Result<()> {
        self.run(&["reset", "--hard", base_ref])?;
        Ok(())
    }

    pub fn clean_fd(&self) -> anyhow::Result<()> {
        self.run(&["clean", "-fd"])?;
        Ok(())
    }

    pub fn diff_patch(&self, base_ref: &str) -> anyhow::Result<Vec<u8>> {
        self.run_raw(&["diff", base_ref])
    }

    pub fn diff_shortstat(&self, base_ref: &str) -> anyhow::Result<String> {
        self.run(&["diff", "--shortstat", base_ref])
    }

    pub fn diff_name_only(&self, base_ref: &str) -> anyhow::Result<String> {
        self.run(&["diff", "--name-only", base_ref])
    }

    pub fn add_all(&self) -> anyhow::Result<()> {
        self.run(&["add", "-A"])?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> anyhow::Result<()> {
        self.run(&["commit", "-m", message])?;
        Ok(())
    }

    pub fn rev_parse_head(&self) -> anyhow::Result<String> {
        self.run(&["rev-parse", "HEAD"])
    }

    pub fn current_branch(&self) -> anyhow::Result<String> {
        self.run(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Fast-forward `base_ref` to `branch` from this repo's own refs
    /// (`git fetch . <branch>:<base_ref>`). Fails (without side effects)
    /// if the update would not be a fast-forward.
    pub fn fetch_local_ff(&self, branch: &str, base_ref: &str) -> anyhow::Result<()> {
        self.run(&["fetch", ".", &format!("{branch}:{base_ref}")])?;
        Ok(())
    }

    pub fn checkout(&self, reference: &str) -> anyhow::Result<()> {
        self.run(&["checkout", reference])?;
        Ok(())
    }

    pub fn cherry_pick(&self, sha: &str) -> anyhow::Result<()> {
        self.run(&["cherry-pick", sha])?;
        Ok(())
    }

    /// Resolve `reference` (branch name or commit-ish) to a commit hash;
    /// used to validate a base ref before creating a worktree from it.
    pub fn resolve_ref(&self, reference: &str) -> anyhow::Result<String> {
        self.run(&["rev-parse", reference])
    }
}

#[cfg(test)]
pub(crate) mod test_repo {
    //! Shared fixture for tests that need a real git repository.
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    pub struct TestRepo {
        pub dir: TempDir,
    }

    impl TestRepo {
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let run = |args: &[&str]| {
                let status = Command::new("git")
                    .args(args)
                    .current_dir(dir.path())
                    .status()
                    .expect("git must be installed to run this test");
                assert!(status.success(), "git {args:?} failed");
            };
            run(&["init", "-q", "-b", "main"]);
            run(&["config", "user.email", "test@example.com"]);
            run(&["config", "user.name", "Test"]);
            std::fs::write(dir.path().join("README.md"), "hello\n").unwrap();
            run(&["add", "-A"]);
            run(&["commit", "-q", "-m", "initial"]);
            Self { dir }
        }

        pub fn repo(&self) -> Repository {
            Repository::at(self.dir.path())
        }
    }
}
