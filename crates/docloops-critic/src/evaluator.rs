use async_trait::async_trait;
use docloops_agent::{Agent, AgentConfig};
use docloops_changes::StructuredChange;
use docloops_runner::ExecutionResult;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{EvaluationPrompts, QualityScore, ScoreParseError};

/// Everything a scorer sees for one draft
#[derive(Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub draft: &'a str,
    pub iteration: usize,
    pub change: &'a StructuredChange,
    pub results: &'a [ExecutionResult],
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Agent execution error: {0}")]
    AgentError(String),

    #[error("Failed to parse quality score: {0}")]
    ParseError(#[from] ScoreParseError),
}

/// Scores a draft on accuracy, tone and clarity
#[async_trait]
pub trait QualityEvaluator: Send + Sync {
    fn name(&self) -> &str;

    async fn evaluate(&self, input: EvaluationInput<'_>) -> Result<QualityScore, EvaluationError>;
}

/// Evaluator backed by a text-generation agent
pub struct AgentEvaluator {
    agent: Arc<dyn Agent>,
    config: AgentConfig,
}

impl AgentEvaluator {
    pub fn new(agent: Arc<dyn Agent>, config: AgentConfig) -> Self {
        Self { agent, config }
    }
}

#[async_trait]
impl QualityEvaluator for AgentEvaluator {
    fn name(&self) -> &str {
        self.agent.name()
    }

    async fn evaluate(&self, input: EvaluationInput<'_>) -> Result<QualityScore, EvaluationError> {
        let prompt = EvaluationPrompts::build_evaluation_prompt(input);

        debug!(
            prompt_len = prompt.len(),
            iteration = input.iteration,
            "Running quality evaluation"
        );

        let output = self
            .agent
            .execute(&prompt, &self.config)
            .await
            .map_err(|e| EvaluationError::AgentError(e.to_string()))?;

        info!(
            exit_code = output.exit_code,
            duration_secs = output.duration.as_secs_f64(),
            "Evaluator completed"
        );

        if !output.success() {
            return Err(EvaluationError::AgentError(format!(
                "Evaluator exited with code {}: {}",
                output.exit_code,
                output.diagnostic().trim()
            )));
        }

        Ok(QualityScore::parse(&output.stdout)?)
    }
}
