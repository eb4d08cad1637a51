//! `bar init` — lay down the storage root for the current repository.

use crate::config::Config;
use crate::error::BarError;
use crate::path::{find_repo_root, format_path_for_display, local_storage_root};
use crate::styling::{success_message, println};
use crate::task::{GlobalState, TaskManager};

pub fn handle_init(cwd: &std::path::Path, force: bool) -> anyhow::Result<()> {
    let repo_root = find_repo_root(cwd)?;
    let bar_dir = local_storage_root(&repo_root);

    if bar_dir.exists() && !force {
        return Err(BarError::command_failed(format!(
            "{} already initialized; pass --force to reinitialize",
            format_path_for_display(&bar_dir)
        ))
        .into());
    }

    std::fs::create_dir_all(&bar_dir)?;
    std::fs::create_dir_all(bar_dir.join("tasks"))?;
    std::fs::create_dir_all(bar_dir.join("workspaces"))?;

    Config::default().save(&bar_dir)?;
    TaskManager::new(bar_dir.clone()).save_state(&GlobalState::default())?;

    println!("{}", success_message(format!("Initialized bar in {}", format_path_for_display(&bar_dir))));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_repo::TestRepo;

    #[test]
    fn init_creates_storage_layout() {
        let fixture = TestRepo::new();
        handle_init(fixture.dir.path(), false).unwrap();

        let bar_dir = fixture.dir.path().join(".bar");
        assert!(bar_dir.join("config.yaml").exists());
        assert!(bar_dir.join("state.json").exists());
        assert!(bar_dir.join("tasks").is_dir());
        assert!(bar_dir.join("workspaces").is_dir());
    }

    #[test]
    fn init_twice_without_force_fails() {
        let fixture = TestRepo::new();
        handle_init(fixture.dir.path(), false).unwrap();
        assert!(handle_init(fixture.dir.path(), false).is_err());
    }

    #[test]
    fn init_twice_with_force_succeeds() {
        let fixture = TestRepo::new();
        handle_init(fixture.dir.path(), false).unwrap();
        handle_init(fixture.dir.path(), true).unwrap();
    }
}
