//! Diff engine: summarises a workspace's divergence from its base ref.
//!
//! Built on [`crate::git::Repository`]'s diff subcommands. `git diff
//! --shortstat` is free-text ("2 files changed, 3 insertions(+), 1
//! deletion(-)") rather than structured, so parsing it tolerantly
//! (singular/plural, missing insertions or deletions entirely) is the
//! one subtle part of this module.

use serde::{Deserialize, Serialize};

use crate::git::Repository;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffStat {
    pub files: u32,
    pub additions: u32,
    pub deletions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResult {
    pub stat: DiffStat,
    pub file_list: Vec<String>,
    pub patch: String,
}

/// Generate a diff of `repo`'s working tree against `base_ref`.
///
/// An empty diff (clean tree, nothing to report) is not an error: it
/// yields a zeroed [`DiffStat`], an empty file list and an empty patch.
pub fn generate(repo: &Repository, base_ref: &str) -> anyhow::Result<DiffResult> {
    let shortstat = repo.diff_shortstat(base_ref)?;
    let stat = parse_shortstat(&shortstat);

    let name_only = repo.diff_name_only(base_ref)?;
    let file_list = name_only
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    let patch_bytes = repo.diff_patch(base_ref)?;
    let patch = String::from_utf8_lossy(&patch_bytes).into_owned();

    Ok(DiffResult { stat, file_list, patch })
}

/// Parse `git diff --shortstat` output such as:
///
/// `" 2 files changed, 3 insertions(+), 1 deletion(-)"`
/// `" 1 file changed, 1 insertion(+)"`
/// `" 1 file changed, 4 deletions(-)"`
///
/// An empty or unrecognised line yields all-zero stats rather than an
/// error — a clean tree produces empty shortstat output.
fn parse_shortstat(line: &str) -> DiffStat {
    let mut stat = DiffStat::default();
    let line = line.trim();
    if line.is_empty() {
        return stat;
    }

    for part in line.split(',') {
        let part = part.trim();
        let Some(first_space) = part.find(char::is_whitespace) else { continue };
        let (number, rest) = part.split_at(first_space);
        let Ok(n) = number.trim().parse::<u32>() else { continue };
        let rest = rest.trim();

        if rest.starts_with("file") {
            stat.files = n;
        } else if rest.starts_with("insertion") {
            stat.additions = n;
        } else if rest.starts_with("deletion") {
            stat.deletions = n;
        }
    }

    stat
}
