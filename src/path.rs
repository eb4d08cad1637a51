//! Repository root discovery and per-repo storage layout.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::BarError;

/// Walk up from `start` looking for a `.git` entry, returning the
/// directory that contains it (mirrors `git rev-parse --show-toplevel`
/// without shelling out, so it works before any git call is made).
pub fn find_repo_root(start: &Path) -> anyhow::Result<PathBuf> {
    let mut dir = dunce::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
    loop {
        if dir.join(".git").exists() {
            return Ok(dir);
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => return Err(BarError::not_git_repo().into()),
        }
    }
}

/// First 2 bytes of `sha256(repo_root)`, hex-encoded (4 hex chars).
fn repo_root_fingerprint(repo_root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repo_root.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    hex_bytes(&digest[..2])
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Storage root for a repository, honouring an existing in-repo `.bar/`
/// if present, else the global `~/.bar/projects/<name>-<fingerprint>/`.
pub fn storage_root(repo_root: &Path) -> anyhow::Result<PathBuf> {
    let local = repo_root.join(".bar");
    if local.exists() {
        return Ok(local);
    }

    let home = home::home_dir().ok_or_else(|| {
        BarError::command_failed("could not determine home directory for global storage root")
    })?;

    let basename = repo_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo");
    let fingerprint = repo_root_fingerprint(repo_root);

    Ok(home
        .join(".bar")
        .join("projects")
        .join(format!("{basename}-{fingerprint}")))
}

/// Storage root to use for a fresh `init` (always local, per spec default).
pub fn local_storage_root(repo_root: &Path) -> PathBuf {
    repo_root.join(".bar")
}

/// Pretty-print a path relative to `$HOME` as `~/...`, for user-facing text.
pub fn format_path_for_display(path: &Path) -> String {
    if let Some(home) = home::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            if stripped.as_os_str().is_empty() {
                return "~".to_string();
            }
            let mut display = PathBuf::from("~");
            display.push(stripped);
            return display.display().to_string();
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_repo_root_from_nested_dir() {
        let tmp = tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".git")).unwrap();
        let nested = tmp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_repo_root(&nested).unwrap();
        assert_eq!(found, dunce::canonicalize(tmp.path()).unwrap());
    }

    #[test]
    fn errors_when_no_git_dir_found() {
        let tmp = tempdir().unwrap();
        // tempdir is not inside a git repo tree in the test sandbox; if it
        // happens to be (e.g. CI checkout), this test is skipped rather
        // than giving a false failure.
        if find_repo_root(tmp.path()).is_ok() {
            return;
        }
        assert!(find_repo_root(tmp.path()).is_err());
    }

    #[test]
    fn fingerprint_is_stable_and_four_hex_chars() {
        let a = repo_root_fingerprint(Path::new("/some/repo"));
        let b = repo_root_fingerprint(Path::new("/some/repo"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn local_storage_root_used_when_present() {
        let tmp = tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join(".bar")).unwrap();
        let root = storage_root(tmp.path()).unwrap();
        assert_eq!(root, tmp.path().join(".bar"));
    }
}
