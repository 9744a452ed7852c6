use async_trait::async_trait;
use docloops_agent::{Agent, AgentConfig};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{Draft, DraftPrompts, DraftRequest};

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("Agent execution error: {0}")]
    AgentError(String),

    #[error("Drafter produced no content")]
    EmptyOutput,
}

/// Produces documentation drafts from a structured change
#[async_trait]
pub trait DraftGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Initial draft when `request.previous` is `None`, otherwise a revision
    /// addressing `request.correction`.
    async fn draft(&self, request: DraftRequest<'_>) -> Result<Draft, DraftError>;
}

/// Drafter backed by a text-generation agent
pub struct AgentDrafter {
    agent: Arc<dyn Agent>,
    config: AgentConfig,
}

impl AgentDrafter {
    pub fn new(agent: Arc<dyn Agent>, config: AgentConfig) -> Self {
        Self { agent, config }
    }

    fn build_prompt(request: &DraftRequest<'_>) -> String {
        match (request.previous, request.correction) {
            (Some(previous), Some(correction)) => {
                DraftPrompts::revision(request.change, previous, correction)
            }
            _ => DraftPrompts::initial(request.change),
        }
    }
}

#[async_trait]
impl DraftGenerator for AgentDrafter {
    fn name(&self) -> &str {
        self.agent.name()
    }

    async fn draft(&self, request: DraftRequest<'_>) -> Result<Draft, DraftError> {
        let prompt = Self::build_prompt(&request);
        let iteration = request.next_iteration();

        debug!(
            prompt_len = prompt.len(),
            iteration,
            revision = request.is_revision(),
            "Running drafter"
        );

        let output = self
            .agent
            .execute(&prompt, &self.config)
            .await
            .map_err(|e| DraftError::AgentError(e.to_string()))?;

        info!(
            exit_code = output.exit_code,
            duration_secs = output.duration.as_secs_f64(),
            "Drafter completed"
        );

        if !output.success() {
            return Err(DraftError::AgentError(format!(
                "Drafter exited with code {}: {}",
                output.exit_code,
                output.diagnostic().trim()
            )));
        }

        let content = unwrap_markdown_fence(&output.stdout);
        if content.trim().is_empty() {
            return Err(DraftError::EmptyOutput);
        }

        Ok(Draft {
            content: content.to_string(),
            iteration,
            change: request.change.clone(),
            fallback: false,
        })
    }
}

/// Strip a single ```` ```markdown ```` fence wrapping the whole output
pub(crate) fn unwrap_markdown_fence(output: &str) -> &str {
    let trimmed = output.trim();
    let Some((first, rest)) = trimmed.split_once('\n') else {
        return trimmed;
    };

    let ticks = first.chars().take_while(|c| *c == '`').count();
    let info = first[ticks..].trim();
    if ticks < 3 || !matches!(info, "markdown" | "md") {
        return trimmed;
    }

    match rest.rsplit_once('\n') {
        Some((inner, last)) if last.trim() == &first[..ticks] => inner,
        None if rest.trim() == &first[..ticks] => "",
        _ => trimmed,
    }
}
