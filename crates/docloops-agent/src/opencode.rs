use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

use crate::{Agent, AgentConfig, AgentError, AgentOutput, ProcessSpawner};

/// OpenCode CLI used as a plain text generator (`opencode run`)
pub struct OpenCodeAgent {
    binary_path: PathBuf,
}

impl OpenCodeAgent {
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from("opencode"),
        }
    }

    pub fn with_binary_path(path: PathBuf) -> Self {
        Self { binary_path: path }
    }
}

impl Default for OpenCodeAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for OpenCodeAgent {
    fn name(&self) -> &str {
        "OpenCode"
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

        let mut args = vec!["run"];

        let model_arg;
        if let Some(ref model) = config.model {
            args.push("--model");
            model_arg = model.clone();
            args.push(&model_arg);
        }

        args.push("--prompt");
        args.push(prompt);

        ProcessSpawner::spawn(&self.binary_path, &args, config).await
    }
}
