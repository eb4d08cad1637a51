//! On-disk YAML configuration, loaded once per process into a typed struct.
//!
//! Follows the corpus's config pattern: a `#[serde(default)]`-annotated
//! struct with a matching `Default` impl, a `load`/`save` pair that
//! round-trips through the typed form, and tolerant deserialisation so an
//! older config file with missing keys still loads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub git: GitConfig,
    pub policy: PolicyConfig,
    pub hooks: HooksConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub default_base: String,
    pub branch_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub enabled: bool,
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub pre_run: Vec<String>,
    pub post_run: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub color: bool,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            version: 1,
            git: GitConfig::default(),
            policy: PolicyConfig::default(),
            hooks: HooksConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        GitConfig {
            default_base: "main".to_string(),
            branch_prefix: "bar/".to_string(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            enabled: false,
            path: ".bar/policy.yaml".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig { color: true, verbose: false }
    }
}

impl Config {
    pub fn config_path(bar_dir: &Path) -> PathBuf {
        bar_dir.join("config.yaml")
    }

    /// Load the config at `<bar_dir>/config.yaml`, or defaults if absent.
    pub fn load(bar_dir: &Path) -> anyhow::Result<Self> {
        let path = Self::config_path(bar_dir);
        if !path.exists() {
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&text)?;
        Ok(config)
    }

    pub fn save(&self, bar_dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(bar_dir)?;
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(Self::config_path(bar_dir), yaml)?;
        Ok(())
    }

    /// Resolve the policy file path to an absolute path, relative to the
    /// repository root if `policy.path` is relative.
    pub fn policy_path(&self, repo_root: &Path) -> PathBuf {
        let raw = PathBuf::from(&self.policy.path);
        if raw.is_absolute() {
            raw
        } else {
            repo_root.join(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.git.default_base, "main");
        assert_eq!(config.git.branch_prefix, "bar/");
        assert!(!config.policy.enabled);
        assert_eq!(config.policy.path, ".bar/policy.yaml");
        assert!(config.output.color);
        assert!(!config.output.verbose);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempdir().unwrap();
        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.version, 1);
    }

    #[test]
    fn roundtrips_through_yaml() {
        let tmp = tempdir().unwrap();
        let mut config = Config::default();
        config.policy.enabled = true;
        config.save(tmp.path()).unwrap();

        let loaded = Config::load(tmp.path()).unwrap();
        assert!(loaded.policy.enabled);
    }

    #[test]
    fn tolerates_unknown_keys() {
        let tmp = tempdir().unwrap();
        std::fs::write(
            Config::config_path(tmp.path()),
            "version: 1\nsome_future_key: true\n",
        )
        .unwrap();
        let config = Config::load(tmp.path()).unwrap();
        assert_eq!(config.version, 1);
    }
}
