//! Declarative, regex-based command policy gate.
//!
//! Stateless once loaded: [`Policy::check`] joins an argv vector into a
//! single candidate string and tests every rule's pattern against it in
//! declaration order, exactly like the corpus's approval-gate pattern
//! (`command_approval`) but automated instead of interactive.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::BarError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Block,
    Warn,
    Log,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Block => "block",
            Action::Warn => "warn",
            Action::Log => "log",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub pattern: String,
    pub action: Action,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub version: u32,
    pub rules: Vec<Rule>,
}

/// One rule match, attached to the resulting run step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub rule_name: String,
    pub action: String,
    pub matched_pattern: String,
    pub reason: String,
}

/// Outcome of [`Policy::check`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub allowed: bool,
    pub events: Vec<Event>,
}

impl CheckResult {
    /// The first blocking event, if any — used to build the surfaced
    /// `POLICY_VIOLATION` error.
    pub fn first_block(&self) -> Option<&Event> {
        self.events.iter().find(|e| e.action == Action::Block.as_str())
    }
}

impl Policy {
    /// Load a policy document from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let policy: Policy = serde_yaml::from_str(&text)?;
        Ok(policy)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Classify `argv` against every rule, in declaration order.
    ///
    /// Returns an error (rather than a result) if any rule's pattern fails
    /// to compile — an invalid policy is a hard configuration error, and
    /// the command must not run.
    pub fn check(&self, argv: &[String]) -> anyhow::Result<CheckResult> {
        let candidate = argv.join(" ");
        let mut events = Vec::new();

        for rule in &self.rules {
            let re = Regex::new(&rule.pattern).map_err(|e| {
                BarError::command_failed(format!(
                    "invalid policy pattern in rule `{}`: {e}",
                    rule.name
                ))
            })?;
            if re.is_match(&candidate) {
                events.push(Event {
                    rule_name: rule.name.clone(),
                    action: rule.action.as_str().to_string(),
                    matched_pattern: rule.pattern.clone(),
                    reason: rule.reason.clone(),
                });
            }
        }

        let allowed = !events.iter().any(|e| e.action == Action::Block.as_str());
        Ok(CheckResult { allowed, events })
    }

    /// The shipped default rule set (§4.3): a handful of anchored or
    /// contextual regexes chosen to avoid false positives on innocuous
    /// subpaths (e.g. `rm -rf /tmp/build` must not match `rm -rf /`).
    pub fn default_rules() -> Self {
        Policy {
            version: 1,
            rules: vec![
                Rule {
                    name: "no-rm-rf-root".into(),
                    pattern: r"rm\s+(-\w*r\w*f\w*|-\w*f\w*r\w*)\s+/\s*($|\s)".into(),
                    action: Action::Block,
                    reason: "refuses to recursively delete the filesystem root".into(),
                },
                Rule {
                    name: "no-rm-rf-home".into(),
                    pattern: r"rm\s+(-\w*r\w*f\w*|-\w*f\w*r\w*)\s+~\s*($|\s)".into(),
                    action: Action::Block,
                    reason: "refuses to recursively delete the home directory".into(),
                },
                Rule {
                    name: "no-raw-disk-write".into(),
                    pattern: r">\s*/dev/sd[a-z]\d*\b".into(),
                    action: Action::Block,
                    reason: "refuses to write directly to a raw block device".into(),
                },
                Rule {
                    name: "no-mkfs".into(),
                    pattern: r"\bmkfs(\.\w+)?\b".into(),
                    action: Action::Block,
                    reason: "refuses to format a filesystem".into(),
                },
                Rule {
                    name: "no-dd-to-disk".into(),
                    pattern: r"\bdd\b.*\bof=/dev/sd[a-z]\d*\b".into(),
                    action: Action::Block,
                    reason: "refuses to write raw blocks to a disk device".into(),
                },
                Rule {
                    name: "warn-sudo".into(),
                    pattern: r"\bsudo\b".into(),
                    action: Action::Warn,
                    reason: "command escalates privileges".into(),
                },
                Rule {
                    name: "warn-chmod-777".into(),
                    pattern: r"\bchmod\s+(-\w+\s+)?777\b".into(),
                    action: Action::Warn,
                    reason: "grants world-writable permissions".into(),
                },
                Rule {
                    name: "warn-curl-pipe-sh".into(),
                    pattern: r"curl\b[^|]*\|\s*(sudo\s+)?sh\b".into(),
                    action: Action::Warn,
                    reason: "pipes a remote script directly into a shell".into(),
                },
                Rule {
                    name: "log-git-push".into(),
                    pattern: r"\bgit\s+push\b".into(),
                    action: Action::Log,
                    reason: "pushes to a remote".into(),
                },
                Rule {
                    name: "log-npm-publish".into(),
                    pattern: r"\bnpm\s+publish\b".into(),
                    action: Action::Log,
                    reason: "publishes a package".into(),
                },
            ],
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy { version: 1, rules: Vec::new() }
    }
}
