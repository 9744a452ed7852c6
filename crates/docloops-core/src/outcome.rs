use docloops_critic::QualityScore;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::IterationRecord;

/// The final outcome of a correction loop run
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoopOutcome {
    /// A draft met the threshold
    Accepted {
        content: String,
        /// Where the documentation belongs, relative to the repository root
        doc_path: String,
        score: QualityScore,
        iterations: usize,
        fallback: bool,
        #[serde(skip)]
        history: Vec<IterationRecord>,
        total_duration_secs: f64,
    },
    /// Attempts ran out; carries the best-scoring draft
    Degraded {
        content: String,
        doc_path: String,
        score: QualityScore,
        iterations: usize,
        best_iteration: usize,
        fallback: bool,
        #[serde(skip)]
        history: Vec<IterationRecord>,
        total_duration_secs: f64,
    },
    /// Stopped by the caller; no artifact
    Cancelled {
        iterations: usize,
        #[serde(skip)]
        history: Vec<IterationRecord>,
        total_duration_secs: f64,
    },
}

impl LoopOutcome {
    pub fn accepted(
        content: String,
        doc_path: String,
        score: QualityScore,
        iterations: usize,
        fallback: bool,
        history: Vec<IterationRecord>,
        duration: Duration,
    ) -> Self {
        Self::Accepted {
            content,
            doc_path,
            score,
            iterations,
            fallback,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn degraded(
        content: String,
        doc_path: String,
        score: QualityScore,
        iterations: usize,
        best_iteration: usize,
        fallback: bool,
        history: Vec<IterationRecord>,
        duration: Duration,
    ) -> Self {
        Self::Degraded {
            content,
            doc_path,
            score,
            iterations,
            best_iteration,
            fallback,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn cancelled(iterations: usize, history: Vec<IterationRecord>, duration: Duration) -> Self {
        Self::Cancelled {
            iterations,
            history,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    /// Final documentation, `None` when cancelled
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Accepted { content, .. } | Self::Degraded { content, .. } => Some(content),
            Self::Cancelled { .. } => None,
        }
    }

    /// Suggested file for the documentation, `None` when cancelled
    pub fn doc_path(&self) -> Option<&str> {
        match self {
            Self::Accepted { doc_path, .. } | Self::Degraded { doc_path, .. } => Some(doc_path),
            Self::Cancelled { .. } => None,
        }
    }

    pub fn score(&self) -> Option<&QualityScore> {
        match self {
            Self::Accepted { score, .. } | Self::Degraded { score, .. } => Some(score),
            Self::Cancelled { .. } => None,
        }
    }

    /// Iterations consumed
    pub fn iterations(&self) -> usize {
        match self {
            Self::Accepted { iterations, .. } => *iterations,
            Self::Degraded { iterations, .. } => *iterations,
            Self::Cancelled { iterations, .. } => *iterations,
        }
    }

    pub fn history(&self) -> &[IterationRecord] {
        match self {
            Self::Accepted { history, .. }
            | Self::Degraded { history, .. }
            | Self::Cancelled { history, .. } => history,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::Degraded { .. } => "degraded",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Accepted { .. } => 0,
            Self::Degraded { .. } => 1,
            Self::Cancelled { .. } => 130,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docloops_critic::ScoreSource;

    #[test]
    fn test_serializes_with_status_tag() {
        let outcome = LoopOutcome::degraded(
            "# Docs".into(),
            "src/DOCUMENTATION.md".into(),
            QualityScore::new(0.5, 0.5, 0.5, vec![], ScoreSource::Heuristic),
            3,
            2,
            false,
            vec![],
            Duration::from_secs(1),
        );
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["status"], "degraded");
        assert_eq!(json["best_iteration"], 2);
        assert_eq!(json["content"], "# Docs");
        assert_eq!(json["doc_path"], "src/DOCUMENTATION.md");
        assert_eq!(outcome.doc_path(), Some("src/DOCUMENTATION.md"));
        assert!(json.get("history").is_none());
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(outcome.tag(), "degraded");
    }

    #[test]
    fn test_cancelled_has_no_artifact() {
        let outcome = LoopOutcome::cancelled(1, vec![], Duration::ZERO);
        assert!(outcome.content().is_none());
        assert!(outcome.score().is_none());
        assert!(outcome.doc_path().is_none());
        assert_eq!(outcome.exit_code(), 130);
    }
}
