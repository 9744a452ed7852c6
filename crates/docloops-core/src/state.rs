use chrono::{DateTime, Utc};
use docloops_critic::{QualityScore, ScoreSource};
use docloops_drafter::Draft;
use docloops_runner::ExecutionResult;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::LoopConfig;

/// Per-invocation state of the correction loop
#[derive(Debug)]
pub struct LoopState {
    pub run_id: String,
    /// Current iteration (1-based, 0 before the first draft)
    pub iteration: usize,
    pub max_attempts: usize,
    pub threshold: f64,
    pub history: Vec<IterationRecord>,
    last: Option<(Draft, QualityScore)>,
    best: Option<(Draft, QualityScore)>,
    started_at: Instant,
}

/// Summary of one completed iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub overall: f64,
    pub accuracy: f64,
    pub tone: f64,
    pub clarity: f64,
    pub score_source: ScoreSource,
    pub draft_fallback: bool,
    pub snippets_total: usize,
    pub snippets_failed: usize,
    pub snippets_skipped: usize,
    pub timestamp: DateTime<Utc>,
}

impl LoopState {
    pub fn new(run_id: String, config: &LoopConfig) -> Self {
        Self {
            run_id,
            iteration: 0,
            max_attempts: config.max_attempts,
            threshold: config.threshold,
            history: Vec::new(),
            last: None,
            best: None,
            started_at: Instant::now(),
        }
    }

    /// Advance to the next iteration and return its number
    pub fn begin_iteration(&mut self) -> usize {
        debug_assert!(self.iteration < self.max_attempts);
        self.iteration += 1;
        self.iteration
    }

    pub fn has_attempts_left(&self) -> bool {
        self.iteration < self.max_attempts
    }

    /// Store an evaluated draft. The best draft only changes on a strictly
    /// higher score, so ties keep the earliest iteration.
    pub fn record(&mut self, draft: Draft, score: QualityScore, results: &[ExecutionResult]) {
        self.history.push(IterationRecord {
            iteration: draft.iteration,
            overall: score.overall,
            accuracy: score.accuracy,
            tone: score.tone,
            clarity: score.clarity,
            score_source: score.source,
            draft_fallback: draft.fallback,
            snippets_total: results.len(),
            snippets_failed: results.iter().filter(|r| r.is_failure()).count(),
            snippets_skipped: results.iter().filter(|r| r.is_skipped()).count(),
            timestamp: Utc::now(),
        });

        let improves = self
            .best
            .as_ref()
            .map_or(true, |(_, best)| score.overall > best.overall);
        if improves {
            self.best = Some((draft.clone(), score.clone()));
        }
        self.last = Some((draft, score));
    }

    pub fn last_draft(&self) -> Option<&Draft> {
        self.last.as_ref().map(|(draft, _)| draft)
    }

    pub fn best(&self) -> Option<&(Draft, QualityScore)> {
        self.best.as_ref()
    }

    pub fn take_best(&mut self) -> Option<(Draft, QualityScore)> {
        self.best.take()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
