use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::trace;

use crate::{Agent, AgentConfig, AgentError, AgentOutput};

/// Caps the number of in-flight calls to a shared agent.
///
/// Callers beyond the limit wait for a permit instead of failing, so one
/// throttled agent can back several loops running at the same time.
pub struct ThrottledAgent {
    inner: Box<dyn Agent>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ThrottledAgent {
    /// A limit of zero is treated as one.
    pub fn new(inner: Box<dyn Agent>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Permits not currently held by a running call
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl Agent for ThrottledAgent {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, prompt: &str, config: &AgentConfig) -> Result<AgentOutput, AgentError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AgentError::ExecutionFailed("agent pool closed".into()))?;
        trace!(
            agent = self.inner.name(),
            available = self.permits.available_permits(),
            "Acquired agent permit"
        );
        self.inner.execute(prompt, config).await
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }
}
