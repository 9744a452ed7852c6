//! # docloops-agent
//!
//! Text-generation agents for docloops. The drafting and scoring stages
//! talk to a model only through the [`Agent`] trait; the concrete agents
//! here drive locally installed CLIs in non-interactive mode.

mod claude;
mod opencode;
mod output;
mod spawner;
mod throttle;
mod traits;

pub use claude::ClaudeCodeAgent;
pub use opencode::OpenCodeAgent;
pub use output::AgentOutput;
pub use spawner::ProcessSpawner;
pub use throttle::ThrottledAgent;
pub use traits::{Agent, AgentConfig, AgentError, AgentType};

/// Create an agent by type
pub fn create_agent(agent_type: AgentType) -> Box<dyn Agent> {
    match agent_type {
        AgentType::ClaudeCode => Box::new(ClaudeCodeAgent::new()),
        AgentType::OpenCode => Box::new(OpenCodeAgent::new()),
    }
}
