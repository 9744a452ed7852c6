//! Configuration file support for docloops.
//!
//! Loads `docloops.toml` from the working directory and
//! `<config dir>/docloops/config.toml` for the user. Project values win
//! over user values; command-line flags win over both.

use anyhow::{Context, Result};
use docloops_core::{LoopConfig, StageTimeouts};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The project config file name
pub const CONFIG_FILE_NAME: &str = "docloops.toml";

/// Default number of concurrent calls per agent
pub const DEFAULT_AGENT_CONCURRENCY: usize = 2;

/// Ref diffed against when the working tree is clean
pub const DEFAULT_BASE: &str = "main";

/// Contents of a docloops config file
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Minimum overall score for acceptance
    pub threshold: Option<f64>,
    /// Maximum number of drafts
    pub max_attempts: Option<usize>,
    /// Default agent for drafting and evaluation
    pub agent: Option<String>,
    /// Default model for drafting and evaluation
    pub model: Option<String>,
    /// Concurrent calls allowed per agent
    pub agent_concurrency: Option<usize>,
    /// Branch, tag or commit to diff against when the working tree is clean
    pub base: Option<String>,
    /// How snippets in drafts are executed
    pub runner: Option<RunnerChoice>,
    #[serde(default)]
    pub drafter: RoleConfig,
    #[serde(default)]
    pub evaluator: RoleConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Agent settings for one role (drafter or evaluator)
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    pub agent: Option<String>,
    pub model: Option<String>,
}

/// Snippet execution backend
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunnerChoice {
    /// Local interpreters in a scratch directory
    Local,
    /// Never execute snippets; every snippet is skipped
    #[serde(rename = "none")]
    Disabled,
}

/// Stage timeouts, written like `"90s"` or `"5m"`
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    #[serde(default, with = "humantime_serde")]
    pub structure: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub draft: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub snippet: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub evaluate: Option<Duration>,
}

impl FileConfig {
    /// Load a config file.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if the file exists and parses
    /// - `Ok(None)` if it does not exist
    /// - `Err(...)` if it exists but fails to parse
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(Some(config))
    }

    /// `docloops.toml` in the working directory
    pub fn load_project(working_dir: &Path) -> Result<Option<Self>> {
        Self::load(&working_dir.join(CONFIG_FILE_NAME))
    }

    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("docloops").join("config.toml"))
    }

    /// Fill every field missing here from `lower`.
    ///
    /// Role settings are resolved within each file first, so a global
    /// `agent` here beats a `[drafter].agent` in `lower`.
    pub fn or(self, lower: FileConfig) -> FileConfig {
        let upper = self.with_roles_resolved();
        let lower = lower.with_roles_resolved();
        FileConfig {
            threshold: upper.threshold.or(lower.threshold),
            max_attempts: upper.max_attempts.or(lower.max_attempts),
            agent: upper.agent.or(lower.agent),
            model: upper.model.or(lower.model),
            agent_concurrency: upper.agent_concurrency.or(lower.agent_concurrency),
            base: upper.base.or(lower.base),
            runner: upper.runner.or(lower.runner),
            drafter: RoleConfig {
                agent: upper.drafter.agent.or(lower.drafter.agent),
                model: upper.drafter.model.or(lower.drafter.model),
            },
            evaluator: RoleConfig {
                agent: upper.evaluator.agent.or(lower.evaluator.agent),
                model: upper.evaluator.model.or(lower.evaluator.model),
            },
            timeouts: TimeoutConfig {
                structure: upper.timeouts.structure.or(lower.timeouts.structure),
                draft: upper.timeouts.draft.or(lower.timeouts.draft),
                snippet: upper.timeouts.snippet.or(lower.timeouts.snippet),
                evaluate: upper.timeouts.evaluate.or(lower.timeouts.evaluate),
            },
        }
    }

    /// Copy the global agent and model into role sections that lack them
    fn with_roles_resolved(mut self) -> Self {
        for role in [&mut self.drafter, &mut self.evaluator] {
            if role.agent.is_none() {
                role.agent = self.agent.clone();
            }
            if role.model.is_none() {
                role.model = self.model.clone();
            }
        }
        self
    }

    /// Effective agent for drafting.
    /// Priority: [drafter].agent > global agent > None
    pub fn drafter_agent(&self) -> Option<&str> {
        self.drafter.agent.as_deref().or(self.agent.as_deref())
    }

    /// Priority: [drafter].model > global model > None
    pub fn drafter_model(&self) -> Option<&str> {
        self.drafter.model.as_deref().or(self.model.as_deref())
    }

    /// Effective agent for evaluation.
    /// Priority: [evaluator].agent > global agent > None
    pub fn evaluator_agent(&self) -> Option<&str> {
        self.evaluator.agent.as_deref().or(self.agent.as_deref())
    }

    /// Priority: [evaluator].model > global model > None
    pub fn evaluator_model(&self) -> Option<&str> {
        self.evaluator.model.as_deref().or(self.model.as_deref())
    }

    /// Base ref with the command-line value taking precedence
    pub fn base<'a>(&'a self, flag: Option<&'a str>) -> Option<&'a str> {
        flag.or(self.base.as_deref())
    }

    pub fn runner(&self) -> RunnerChoice {
        self.runner.unwrap_or(RunnerChoice::Local)
    }

    pub fn agent_concurrency(&self) -> usize {
        self.agent_concurrency.unwrap_or(DEFAULT_AGENT_CONCURRENCY)
    }

    /// Loop settings with command-line values taking precedence
    pub fn loop_config(&self, threshold: Option<f64>, max_attempts: Option<usize>) -> LoopConfig {
        let defaults = StageTimeouts::default();
        let timeouts = StageTimeouts {
            structure: self.timeouts.structure.unwrap_or(defaults.structure),
            draft: self.timeouts.draft.unwrap_or(defaults.draft),
            snippet: self.timeouts.snippet.unwrap_or(defaults.snippet),
            evaluate: self.timeouts.evaluate.unwrap_or(defaults.evaluate),
        };

        let mut config = LoopConfig::default().with_timeouts(timeouts);
        if let Some(threshold) = threshold.or(self.threshold) {
            config = config.with_threshold(threshold);
        }
        if let Some(max_attempts) = max_attempts.or(self.max_attempts) {
            config = config.with_max_attempts(max_attempts);
        }
        config
    }
}
