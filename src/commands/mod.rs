//! Subcommand handlers: one module per user-visible operation, wired
//! into `bar`'s collaborators through a shared [`Context`].

mod apply;
mod diff;
mod init;
mod log;
mod rollback;
mod run;
mod status;
mod task;
mod ui;
mod update;

pub use self::apply::handle_apply;
pub use self::diff::{handle_diff, DiffArgs, DiffFormat};
pub use self::init::handle_init;
pub use self::log::{handle_log, LogArgs, LogFormat};
pub use self::rollback::{handle_rollback, RollbackArgs};
pub use self::run::{handle_run, handle_wrap, RunArgs, WrapArgs};
pub use self::status::{handle_status, StatusFormat};
pub use self::task::{handle_task_close, handle_task_list, handle_task_start, handle_task_switch};
pub use self::ui::handle_ui;
pub use self::update::handle_update;

use std::path::PathBuf;

use crate::config::Config;
use crate::git::Repository;
use crate::task::TaskManager;

/// Everything a subcommand handler needs: the discovered repository
/// root, the per-repo storage root, loaded config, and a task manager
/// bound to that storage root.
pub struct Context {
    pub repo_root: PathBuf,
    pub bar_dir: PathBuf,
    pub config: Config,
    pub tasks: TaskManager,
}

impl Context {
    /// Discover the repository root from `cwd`, load `.bar/config.yaml`
    /// (or an in-home global storage root), and fail with
    /// [`crate::error::BarError::not_initialized`] if no storage root
    /// exists yet — every subcommand but `init` requires one.
    pub fn discover(cwd: &std::path::Path) -> anyhow::Result<Self> {
        let repo_root = crate::path::find_repo_root(cwd)?;
        let bar_dir = crate::path::storage_root(&repo_root)?;
        if !bar_dir.exists() {
            return Err(crate::error::BarError::not_initialized().into());
        }
        let config = Config::load(&bar_dir)?;
        let tasks = TaskManager::new(bar_dir.clone());
        Ok(Self { repo_root, bar_dir, config, tasks })
    }

    pub fn repo(&self) -> Repository {
        Repository::at(&self.repo_root)
    }
}
