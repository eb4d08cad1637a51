//! Task lifecycle: the unit of isolated work inside a repository.
//!
//! A task owns a worktree, a branch, and a ledger. Task metadata and the
//! single "which task is active" pointer live under `.bar/tasks/<id>/` and
//! `.bar/state.json` respectively (see SPEC_FULL.md §5). All
//! read-modify-write sequences on those two files are guarded by an
//! advisory `.lock` file, following the corpus's preference for a simple
//! filesystem primitive over an embedded database.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::BarError;
use crate::utils::{generate_task_id, now, sanitize_branch_name};

/// `<branch_prefix><sanitised_name>-<taskID>`, per the spec's branch
/// naming rule.
pub fn branch_name(branch_prefix: &str, name: &str, task_id: &str) -> String {
    format!("{branch_prefix}{}-{task_id}", sanitize_branch_name(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub repo_root: PathBuf,
    pub base_ref: String,
    pub branch: String,
    pub workspace_path: PathBuf,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_task_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for GlobalState {
    fn default() -> Self {
        GlobalState { version: 1, active_task_id: None, updated_at: now() }
    }
}

/// Holds a non-blocking advisory exclusive lock on `<task_dir>/.lock`
/// for the lifetime of the guard, resolving the concurrent CLI
/// invocation open question: two overlapping `bar` invocations against
/// the same task serialize on `NextStepID` and the task.json/state.json
/// read-modify-write cycle rather than racing.
pub struct TaskLock {
    _file: File,
}

impl TaskLock {
    pub fn acquire(task_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(task_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(task_dir.join(".lock"))?;
        file.try_lock_exclusive().map_err(|_| {
            BarError::command_failed(
                "another bar invocation holds the lock on this task; try again",
            )
        })?;
        Ok(Self { _file: file })
    }
}

impl Drop for TaskLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self._file);
    }
}

/// Manages tasks under `<bar_dir>/tasks/<id>/` and the active-task
/// pointer at `<bar_dir>/state.json`.
pub struct TaskManager {
    bar_dir: PathBuf,
}

impl TaskManager {
    pub fn new(bar_dir: impl Into<PathBuf>) -> Self {
        Self { bar_dir: bar_dir.into() }
    }

    fn tasks_dir(&self) -> PathBuf {
        self.bar_dir.join("tasks")
    }

    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.tasks_dir().join(task_id)
    }

    fn task_json_path(&self, task_id: &str) -> PathBuf {
        self.task_dir(task_id).join("task.json")
    }

    fn state_json_path(&self) -> PathBuf {
        self.bar_dir.join("state.json")
    }

    /// Acquire the advisory lock guarding `task_id`'s directory.
    pub fn lock(&self, task_id: &str) -> anyhow::Result<TaskLock> {
        TaskLock::acquire(&self.task_dir(task_id))
    }

    /// A fresh opaque task id, to be threaded through branch/workspace
    /// naming before the task record itself can be built.
    pub fn new_task_id(&self) -> String {
        generate_task_id()
    }

    /// Persist a new task record. The caller (see
    /// [`crate::commands::task`]) is responsible for creating the
    /// workspace and branch first, since both are named from `id`.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &self,
        id: &str,
        name: &str,
        repo_root: &Path,
        base_ref: &str,
        branch: &str,
        workspace_path: PathBuf,
    ) -> anyhow::Result<Task> {
        let ts = now();
        let task = Task {
            id: id.to_string(),
            name: name.to_string(),
            repo_root: repo_root.to_path_buf(),
            base_ref: base_ref.to_string(),
            branch: branch.to_string(),
            workspace_path,
            status: TaskStatus::Active,
            created_at: ts,
            updated_at: ts,
            closed_at: None,
            metadata: Default::default(),
        };
        self.save(&task)?;
        Ok(task)
    }

    pub fn save(&self, task: &Task) -> anyhow::Result<()> {
        let dir = self.task_dir(&task.id);
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(task)?;
        std::fs::write(self.task_json_path(&task.id), json)?;
        Ok(())
    }

    pub fn get(&self, task_id: &str) -> anyhow::Result<Task> {
        let path = self.task_json_path(task_id);
        if !path.exists() {
            return Err(BarError::task_not_found(task_id).into());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn list(&self) -> anyhow::Result<Vec<Task>> {
        let dir = self.tasks_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut tasks = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let task_json = entry.path().join("task.json");
            if task_json.exists() {
                let text = std::fs::read_to_string(task_json)?;
                tasks.push(serde_json::from_str(&text)?);
            }
        }
        tasks.sort_by(|a: &Task, b: &Task| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    /// Resolve a task by exact id, or by unambiguous name match.
    pub fn resolve(&self, id_or_name: &str) -> anyhow::Result<Task> {
        if self.task_json_path(id_or_name).exists() {
            return self.get(id_or_name);
        }
        let matches: Vec<Task> = self
            .list()?
            .into_iter()
            .filter(|t| t.name == id_or_name)
            .collect();
        match matches.len() {
            0 => Err(BarError::task_not_found(id_or_name).into()),
            1 => Ok(matches.into_iter().next().unwrap()),
            _ => Err(BarError::command_failed(format!(
                "task name `{id_or_name}` is ambiguous; use the task id"
            ))
            .into()),
        }
    }

    pub fn load_state(&self) -> anyhow::Result<GlobalState> {
        let path = self.state_json_path();
        if !path.exists() {
            return Ok(GlobalState::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save_state(&self, state: &GlobalState) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.bar_dir)?;
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(self.state_json_path(), json)?;
        Ok(())
    }

    pub fn set_active(&self, task_id: &str) -> anyhow::Result<()> {
        let mut state = self.load_state()?;
        state.active_task_id = Some(task_id.to_string());
        state.updated_at = now();
        self.save_state(&state)
    }

    pub fn get_active(&self) -> anyhow::Result<Option<Task>> {
        match self.load_state()?.active_task_id {
            Some(id) => Ok(Some(self.get(&id)?)),
            None => Ok(None),
        }
    }

    pub fn update(&self, task: &mut Task) -> anyhow::Result<()> {
        task.updated_at = now();
        self.save(task)
    }

    /// Mark a task closed and, if it was the active task, clear the
    /// active-task pointer — both under the same lock hold so a
    /// concurrent `status` never observes a closed task as still active.
    pub fn close_and_clear(&self, task_id: &str) -> anyhow::Result<Task> {
        let _guard = self.lock(task_id)?;
        let mut task = self.get(task_id)?;
        task.status = TaskStatus::Closed;
        task.closed_at = Some(now());
        task.updated_at = task.closed_at.unwrap();
        self.save(&task)?;

        let mut state = self.load_state()?;
        if state.active_task_id.as_deref() == Some(task_id) {
            state.active_task_id = None;
            state.updated_at = now();
            self.save_state(&state)?;
        }
        Ok(task)
    }

    pub fn delete(&self, task_id: &str) -> anyhow::Result<()> {
        let dir = self.task_dir(task_id);
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manager() -> (tempfile::TempDir, TaskManager) {
        let tmp = tempdir().unwrap();
        let mgr = TaskManager::new(tmp.path().join(".bar"));
        (tmp, mgr)
    }

    fn make_task(mgr: &TaskManager, name: &str, workspace_path: &str) -> Task {
        let id = mgr.new_task_id();
        let branch = branch_name("bar/", name, &id);
        mgr.create(&id, name, Path::new("/repo"), "main", &branch, PathBuf::from(workspace_path))
            .unwrap()
    }

    #[test]
    fn create_then_get_roundtrips() {
        let (_tmp, mgr) = manager();
        let task = make_task(&mgr, "fix-bug", "/ws");
        let fetched = mgr.get(&task.id).unwrap();
        assert_eq!(fetched.name, "fix-bug");
        assert_eq!(fetched.branch, format!("bar/fix-bug-{}", task.id));
        assert_eq!(fetched.status, TaskStatus::Active);
    }

    #[test]
    fn get_missing_task_is_task_not_found() {
        let (_tmp, mgr) = manager();
        assert!(mgr.get("nope").is_err());
    }

    #[test]
    fn list_is_sorted_by_creation() {
        let (_tmp, mgr) = manager();
        let a = make_task(&mgr, "a", "/ws/a");
        let b = make_task(&mgr, "b", "/ws/b");
        let listed = mgr.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a.id);
        assert_eq!(listed[1].id, b.id);
    }

    #[test]
    fn resolve_by_name_succeeds_when_unambiguous() {
        let (_tmp, mgr) = manager();
        let task = make_task(&mgr, "unique-name", "/ws");
        let resolved = mgr.resolve("unique-name").unwrap();
        assert_eq!(resolved.id, task.id);
    }

    #[test]
    fn resolve_by_name_fails_when_ambiguous() {
        let (_tmp, mgr) = manager();
        make_task(&mgr, "dup", "/ws/1");
        make_task(&mgr, "dup", "/ws/2");
        assert!(mgr.resolve("dup").is_err());
    }

    #[test]
    fn set_active_and_get_active_roundtrip() {
        let (_tmp, mgr) = manager();
        let task = make_task(&mgr, "t", "/ws");
        mgr.set_active(&task.id).unwrap();
        let active = mgr.get_active().unwrap().unwrap();
        assert_eq!(active.id, task.id);
    }

    #[test]
    fn close_and_clear_clears_active_pointer() {
        let (_tmp, mgr) = manager();
        let task = make_task(&mgr, "t", "/ws");
        mgr.set_active(&task.id).unwrap();
        let closed = mgr.close_and_clear(&task.id).unwrap();
        assert_eq!(closed.status, TaskStatus::Closed);
        assert!(mgr.get_active().unwrap().is_none());
    }

    #[test]
    fn close_and_clear_leaves_other_active_task_alone() {
        let (_tmp, mgr) = manager();
        let a = make_task(&mgr, "a", "/ws/a");
        let b = make_task(&mgr, "b", "/ws/b");
        mgr.set_active(&b.id).unwrap();
        mgr.close_and_clear(&a.id).unwrap();
        assert_eq!(mgr.get_active().unwrap().unwrap().id, b.id);
    }

    #[test]
    fn lock_is_reusable_across_sequential_acquisitions() {
        let (_tmp, mgr) = manager();
        let task = make_task(&mgr, "t", "/ws");
        {
            let _g = mgr.lock(&task.id).unwrap();
        }
        let _g2 = mgr.lock(&task.id).unwrap();
    }

    #[test]
    fn lock_rejects_concurrent_acquisition() {
        let (_tmp, mgr) = manager();
        let task = make_task(&mgr, "t", "/ws");
        let _g1 = mgr.lock(&task.id).unwrap();
        assert!(mgr.lock(&task.id).is_err());
    }

    #[test]
    fn branch_name_includes_prefix_name_and_id() {
        assert_eq!(branch_name("bar/", "Fix Login", "ab12cd34"), "bar/fix-login-ab12cd34");
    }
}
