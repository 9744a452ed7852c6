use std::time::Duration;

use crate::LoopError;

pub const DEFAULT_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Per-call limits for each stage. Exceeding one triggers that stage's fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub structure: Duration,
    pub draft: Duration,
    /// Applies to each snippet separately
    pub snippet: Duration,
    pub evaluate: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            structure: Duration::from_secs(30),
            draft: Duration::from_secs(300),
            snippet: Duration::from_secs(30),
            evaluate: Duration::from_secs(120),
        }
    }
}

/// Settings for the correction loop
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Minimum overall score for acceptance, in [0, 1]
    pub threshold: f64,
    /// Drafts generated at most, at least 1
    pub max_attempts: usize,
    pub timeouts: StageTimeouts,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeouts: StageTimeouts::default(),
        }
    }
}

impl LoopConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn validate(&self) -> Result<(), LoopError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(LoopError::InvalidThreshold(self.threshold));
        }
        if self.max_attempts == 0 {
            return Err(LoopError::ZeroMaxAttempts);
        }
        for (name, limit) in [
            ("structure", self.timeouts.structure),
            ("draft", self.timeouts.draft),
            ("snippet", self.timeouts.snippet),
            ("evaluate", self.timeouts.evaluate),
        ] {
            if limit.is_zero() {
                return Err(LoopError::ZeroTimeout(name));
            }
        }
        Ok(())
    }
}
