use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::AgentOutput;

/// Errors that can occur during agent execution
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Failed to spawn agent process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("Agent execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("Agent not found at path: {0}")]
    NotFound(String),

    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),
}

/// Configuration for agent execution
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Working directory for the agent
    pub working_dir: PathBuf,
    /// Optional timeout (None = no limit)
    pub timeout: Option<Duration>,
    /// Additional environment variables
    pub env_vars: HashMap<String, String>,
    /// Model to use (if agent supports it)
    pub model: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
            env_vars: HashMap::new(),
            model: None,
        }
    }
}

impl AgentConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_env(mut self, key: String, value: String) -> Self {
        self.env_vars.insert(key, value);
        self
    }
}

/// Supported agent CLIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentType {
    ClaudeCode,
    OpenCode,
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentType::ClaudeCode => write!(f, "claude-code"),
            AgentType::OpenCode => write!(f, "opencode"),
        }
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "claude-code" | "claudecode" => Ok(AgentType::ClaudeCode),
            "opencode" | "open-code" => Ok(AgentType::OpenCode),
            _ => Err(format!("Unknown agent type: {}", s)),
        }
    }
}

/// A text-generation capability the drafting and scoring stages can call.
///
/// Implementations take a prompt and return whatever the model printed.
/// They are free to fail; callers decide how to fall back.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Human-readable name of the agent (e.g., "Claude Code", "OpenCode")
    fn name(&self) -> &str;

    /// Run the agent on a prompt and capture its output
    async fn execute(&self, prompt: &str, config: &AgentConfig) -> Result<AgentOutput, AgentError>;

    /// Check if the agent is usable on this system
    async fn is_available(&self) -> bool;
}
