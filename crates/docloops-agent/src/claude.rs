use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use crate::{Agent, AgentConfig, AgentError, AgentOutput, ProcessSpawner};

/// Claude Code CLI used as a plain text generator (`claude --print`)
pub struct ClaudeCodeAgent {
    binary_path: PathBuf,
}

impl ClaudeCodeAgent {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("claude"),
        }
    }

    pub fn with_binary_path(path: PathBuf) -> Self {
        Self { binary_path: path }
    }
}

impl Default for ClaudeCodeAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ClaudeCodeAgent {
    fn name(&self) -> &str {
        "Claude Code"
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.binary_path)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn execute(&self, prompt: &str, config: &AgentConfig) -> Result<AgentOutput, AgentError> {
        debug!(
            agent = self.name(),
            prompt_len = prompt.len(),
            "Executing agent"
        );

        let mut args = vec!["--print"];

        let model_arg;
        if let Some(ref model) = config.model {
            args.push("--model");
            model_arg = model.clone();
            args.push(&model_arg);
        }

        // `--` keeps prompts that start with '-' from being read as options
        args.push("--");
        args.push(prompt);

        ProcessSpawner::spawn(&self.binary_path, &args, config).await
    }
}
