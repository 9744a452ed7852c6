use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use docloops_changes::{ChangeStructurer, DiffStructurer, StructuredChange};
use docloops_critic::{EvaluationInput, HeuristicEvaluator, QualityEvaluator, QualityScore};
use docloops_drafter::{extract_snippets, Correction, Draft, DraftGenerator, DraftRequest, TemplateDrafter};
use docloops_logging::{LogEvent, Logger, Stage};
use docloops_runner::{ExecutionResult, LocalRunner, SnippetOrigin, SnippetRunner};

use crate::{CancelHandle, LoopConfig, LoopError, LoopOutcome, LoopState};

/// The stage implementations a loop drives
#[derive(Clone)]
pub struct Stages {
    pub structurer: Arc<dyn ChangeStructurer>,
    pub drafter: Arc<dyn DraftGenerator>,
    pub runner: Arc<dyn SnippetRunner>,
    pub evaluator: Arc<dyn QualityEvaluator>,
}

impl Stages {
    /// Local implementations only: diff parser, template drafter,
    /// local interpreters and heuristic scoring
    pub fn local() -> Self {
        Self {
            structurer: Arc::new(DiffStructurer::new()),
            drafter: Arc::new(TemplateDrafter::new()),
            runner: Arc::new(LocalRunner::new()),
            evaluator: Arc::new(HeuristicEvaluator::new()),
        }
    }

    pub fn with_structurer(mut self, structurer: Arc<dyn ChangeStructurer>) -> Self {
        self.structurer = structurer;
        self
    }

    pub fn with_drafter(mut self, drafter: Arc<dyn DraftGenerator>) -> Self {
        self.drafter = drafter;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn SnippetRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn QualityEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }
}

/// Input of one run
#[derive(Debug, Clone, Default)]
pub struct RunInput {
    pub raw_change: String,
    pub repo_path: Option<PathBuf>,
    pub cancel: CancelHandle,
}

impl RunInput {
    pub fn new(raw_change: impl Into<String>) -> Self {
        Self {
            raw_change: raw_change.into(),
            ..Default::default()
        }
    }

    pub fn with_repo_path(mut self, path: PathBuf) -> Self {
        self.repo_path = Some(path);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Drives structure, draft, validate and evaluate until a draft is
/// accepted, attempts run out, or the run is cancelled.
///
/// Holds no per-run state; one loop can serve concurrent runs.
pub struct CorrectionLoop {
    stages: Stages,
    config: LoopConfig,
    logger: Arc<Logger>,
    template: TemplateDrafter,
    heuristic: HeuristicEvaluator,
}

impl CorrectionLoop {
    pub fn new(stages: Stages, config: LoopConfig, logger: Arc<Logger>) -> Result<Self, LoopError> {
        config.validate()?;
        Ok(Self {
            stages,
            config,
            logger,
            template: TemplateDrafter::new(),
            heuristic: HeuristicEvaluator::new(),
        })
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Run the loop to a terminal outcome. Never fails: every stage error
    /// is replaced by that stage's local fallback.
    pub async fn run(&self, input: RunInput) -> LoopOutcome {
        let mut state = LoopState::new(Uuid::new_v4().to_string(), &self.config);

        self.logger.log(&LogEvent::LoopStarted {
            run_id: state.run_id.clone(),
            repo_path: input.repo_path.clone(),
            threshold: state.threshold,
            max_attempts: state.max_attempts,
            drafter: self.stages.drafter.name().to_string(),
            evaluator: self.stages.evaluator.name().to_string(),
            runner: self.stages.runner.name().to_string(),
        });
        info!(run_id = %state.run_id, "Correction loop started");

        if input.cancel.is_cancelled() {
            return self.cancelled(state);
        }

        let change = Arc::new(self.structure(&state, &input.raw_change).await);
        self.logger.log(&LogEvent::ChangeStructured {
            run_id: state.run_id.clone(),
            files: change.len(),
            lines_added: change.total_lines_added(),
            lines_removed: change.total_lines_removed(),
            synthetic: change.synthetic,
        });

        let mut correction: Option<Correction> = None;

        loop {
            if input.cancel.is_cancelled() {
                info!(run_id = %state.run_id, "Loop cancelled");
                return self.cancelled(state);
            }

            let iteration = state.begin_iteration();
            let request = match (state.last_draft(), correction.as_ref()) {
                (Some(previous), Some(correction)) => {
                    DraftRequest::revision(&change, previous, correction)
                }
                _ => DraftRequest::initial(&change),
            };

            let draft = self.draft(&state, request).await;
            let results = self.validate(&state, &draft).await;
            let score = self.evaluate(&state, &change, &draft, &results).await;

            if score.meets(state.threshold) {
                state.record(draft.clone(), score.clone(), &results);
                return self.accepted(state, draft, score);
            }

            if !state.has_attempts_left() {
                state.record(draft.clone(), score.clone(), &results);
                let (best_draft, best_score) = state.take_best().unwrap_or((draft, score));
                return self.degraded(state, best_draft, best_score);
            }

            let next = Correction::new(score.clone(), results.iter().cloned());
            self.logger.log(&LogEvent::RetryScheduled {
                run_id: state.run_id.clone(),
                iteration,
                overall: score.overall,
                threshold: state.threshold,
                feedback_items: next.score.feedback.len(),
                failing_snippets: next.failing.len(),
            });
            debug!(iteration, overall = score.overall, "Scheduling revision");

            state.record(draft, score, &results);
            correction = Some(next);
        }
    }

    async fn structure(&self, state: &LoopState, raw_change: &str) -> StructuredChange {
        let limit = self.config.timeouts.structure;
        match within(limit, self.stages.structurer.structure(raw_change)).await {
            Ok(change) => change,
            Err(reason) => {
                self.fallback(state, Stage::Structure, reason);
                StructuredChange::unparsed(raw_change)
            }
        }
    }

    async fn draft(&self, state: &LoopState, request: DraftRequest<'_>) -> Draft {
        let started = Instant::now();
        self.logger.log(&LogEvent::DraftStarted {
            run_id: state.run_id.clone(),
            iteration: state.iteration,
            revision: request.is_revision(),
        });

        let limit = self.config.timeouts.draft;
        let mut draft = match within(limit, self.stages.drafter.draft(request)).await {
            Ok(draft) => draft,
            Err(reason) => {
                self.fallback(state, Stage::Draft, reason);
                self.template.build(request)
            }
        };
        // Iteration numbering and the change belong to the loop, not the drafter
        draft.iteration = request.next_iteration();
        draft.change = Arc::clone(request.change);

        self.logger.log(&LogEvent::DraftCompleted {
            run_id: state.run_id.clone(),
            iteration: draft.iteration,
            chars: draft.content.chars().count(),
            fallback: draft.fallback,
            duration_secs: started.elapsed().as_secs_f64(),
        });
        draft
    }

    /// Run every snippet of the draft concurrently and join them, ordered by origin
    async fn validate(&self, state: &LoopState, draft: &Draft) -> Vec<ExecutionResult> {
        let snippets = extract_snippets(&draft.content);
        let limit = self.config.timeouts.snippet;

        let runs = snippets.iter().map(|snippet| async move {
            match tokio::time::timeout(limit, self.stages.runner.run(snippet)).await {
                Ok(result) => result,
                Err(_) => {
                    let reason = format!("execution timed out after {:?}", limit);
                    self.fallback(
                        state,
                        Stage::Snippet,
                        format!("{}: {}", snippet.origin, reason),
                    );
                    ExecutionResult::skipped(snippet, reason)
                }
            }
        });

        let by_origin: BTreeMap<SnippetOrigin, ExecutionResult> = join_all(runs)
            .await
            .into_iter()
            .map(|result| (result.origin, result))
            .collect();
        let results: Vec<ExecutionResult> = by_origin.into_values().collect();

        self.logger.log(&LogEvent::SnippetsValidated {
            run_id: state.run_id.clone(),
            iteration: state.iteration,
            total: results.len(),
            succeeded: results.iter().filter(|r| r.is_success()).count(),
            failed: results.iter().filter(|r| r.is_failure()).count(),
            skipped: results.iter().filter(|r| r.is_skipped()).count(),
        });
        results
    }

    /// Scores against the change structured for this run, whatever the drafter attached
    async fn evaluate(
        &self,
        state: &LoopState,
        change: &StructuredChange,
        draft: &Draft,
        results: &[ExecutionResult],
    ) -> QualityScore {
        let input = EvaluationInput {
            draft: &draft.content,
            iteration: draft.iteration,
            change,
            results,
        };

        let limit = self.config.timeouts.evaluate;
        let score = match within(limit, self.stages.evaluator.evaluate(input)).await {
            Ok(score) if score.is_finite() => score,
            Ok(score) => {
                let reason = format!("non-finite score: {}", score.short_description());
                self.fallback(state, Stage::Evaluate, reason);
                self.heuristic.score(input)
            }
            Err(reason) => {
                self.fallback(state, Stage::Evaluate, reason);
                self.heuristic.score(input)
            }
        };

        self.logger.log(&LogEvent::EvaluationCompleted {
            run_id: state.run_id.clone(),
            iteration: draft.iteration,
            overall: score.overall,
            accuracy: score.accuracy,
            tone: score.tone,
            clarity: score.clarity,
            source: score.source.to_string(),
        });
        score
    }

    fn fallback(&self, state: &LoopState, stage: Stage, reason: String) {
        warn!(run_id = %state.run_id, %stage, %reason, "Stage failed, using local fallback");
        self.logger.log(&LogEvent::StageFallback {
            run_id: state.run_id.clone(),
            iteration: state.iteration,
            stage,
            reason,
        });
    }

    fn accepted(&self, state: LoopState, draft: Draft, score: QualityScore) -> LoopOutcome {
        let duration = state.elapsed();
        self.logger.log(&LogEvent::LoopAccepted {
            run_id: state.run_id.clone(),
            iterations: state.iteration,
            overall: score.overall,
            duration_secs: duration.as_secs_f64(),
        });
        LoopOutcome::accepted(
            draft.content,
            draft.change.suggested_doc_path(),
            score,
            state.iteration,
            draft.fallback,
            state.history,
            duration,
        )
    }

    fn degraded(&self, state: LoopState, best: Draft, score: QualityScore) -> LoopOutcome {
        let duration = state.elapsed();
        self.logger.log(&LogEvent::LoopDegraded {
            run_id: state.run_id.clone(),
            iterations: state.iteration,
            best_iteration: best.iteration,
            overall: score.overall,
            duration_secs: duration.as_secs_f64(),
        });
        LoopOutcome::degraded(
            best.content,
            best.change.suggested_doc_path(),
            score,
            state.iteration,
            best.iteration,
            best.fallback,
            state.history,
            duration,
        )
    }

    fn cancelled(&self, state: LoopState) -> LoopOutcome {
        let duration = state.elapsed();
        self.logger.log(&LogEvent::LoopCancelled {
            run_id: state.run_id.clone(),
            iterations: state.iteration,
            duration_secs: duration.as_secs_f64(),
        });
        LoopOutcome::cancelled(state.iteration, state.history, duration)
    }
}

/// Await a stage call with a deadline; errors and timeouts become a reason string
async fn within<T, E, F>(limit: Duration, call: F) -> Result<T, String>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {:?}", limit)),
    }
}
