use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Output captured from an agent execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl AgentOutput {
    pub fn new(stdout: String, stderr: String, exit_code: i32, duration: Duration) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            duration,
        }
    }

    /// Check if the agent exited successfully
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stderr when it has content, otherwise stdout. Used for error reporting.
    pub fn diagnostic(&self) -> &str {
        if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
