use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docloops_changes::{ChangeStructurer, StructureError, StructuredChange};
use docloops_core::{
    CancelHandle, CorrectionLoop, LoopConfig, LoopError, LoopOutcome, RunInput, StageTimeouts,
    Stages,
};
use docloops_critic::{
    EvaluationError, EvaluationInput, QualityEvaluator, QualityScore, ScoreSource,
};
use docloops_drafter::{Draft, DraftError, DraftGenerator, DraftRequest};
use docloops_logging::Logger;
use docloops_runner::{CodeSnippet, ExecutionResult, LocalRunner, SnippetRunner};

// ============================================================
// Test doubles
// ============================================================

/// What the drafter was asked for on one call
#[derive(Debug, Clone)]
struct SeenRequest {
    iteration: usize,
    previous_iteration: Option<usize>,
    feedback: Vec<String>,
    failing_errors: Vec<String>,
    synthetic_change: bool,
    paths: Vec<String>,
}

/// Drafter that renders `body` with the iteration number and records requests
struct RecordingDrafter {
    body: String,
    seen: Mutex<Vec<SeenRequest>>,
    delay: Duration,
}

impl RecordingDrafter {
    fn new(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_string(),
            seen: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            body: "never used".to_string(),
            seen: Mutex::new(Vec::new()),
            delay,
        })
    }

    fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DraftGenerator for RecordingDrafter {
    fn name(&self) -> &str {
        "recording"
    }

    async fn draft(&self, request: DraftRequest<'_>) -> Result<Draft, DraftError> {
        let iteration = request.next_iteration();
        self.seen.lock().unwrap().push(SeenRequest {
            iteration,
            previous_iteration: request.previous.map(|d| d.iteration),
            feedback: request
                .correction
                .map(|c| c.score.feedback.clone())
                .unwrap_or_default(),
            failing_errors: request
                .correction
                .map(|c| c.failing.iter().filter_map(|r| r.error.clone()).collect())
                .unwrap_or_default(),
            synthetic_change: request.change.synthetic,
            paths: request.change.paths().map(String::from).collect(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let paths: Vec<String> = request.change.paths().map(String::from).collect();
        Ok(Draft {
            content: self
                .body
                .replace("{n}", &iteration.to_string())
                .replace("{paths}", &paths.join(", ")),
            iteration,
            change: request.change.clone(),
            fallback: false,
        })
    }
}

/// Evaluator returning a scripted sequence of overall scores
struct ScriptedEvaluator {
    scores: Mutex<VecDeque<f64>>,
    cancel_after_first: Option<CancelHandle>,
}

impl ScriptedEvaluator {
    fn new(scores: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            scores: Mutex::new(scores.iter().copied().collect()),
            cancel_after_first: None,
        })
    }

    fn cancelling(score: f64, cancel: CancelHandle) -> Arc<Self> {
        Arc::new(Self {
            scores: Mutex::new(VecDeque::from(vec![score])),
            cancel_after_first: Some(cancel),
        })
    }
}

#[async_trait]
impl QualityEvaluator for ScriptedEvaluator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn evaluate(&self, input: EvaluationInput<'_>) -> Result<QualityScore, EvaluationError> {
        if let Some(cancel) = &self.cancel_after_first {
            cancel.cancel();
        }
        let value = self
            .scores
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| EvaluationError::AgentError("script exhausted".into()))?;
        Ok(QualityScore::new(
            value,
            value,
            value,
            vec![format!("feedback for iteration {}", input.iteration)],
            ScoreSource::Agent,
        ))
    }
}

/// Evaluator scoring a draft by whether it mentions a marker
struct MarkerEvaluator {
    marker: &'static str,
}

#[async_trait]
impl QualityEvaluator for MarkerEvaluator {
    fn name(&self) -> &str {
        "marker"
    }

    async fn evaluate(&self, input: EvaluationInput<'_>) -> Result<QualityScore, EvaluationError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let value = if input.draft.contains(self.marker) { 1.0 } else { 0.0 };
        Ok(QualityScore::new(value, value, value, vec![], ScoreSource::Agent))
    }
}

/// Evaluator whose score bypasses clamping and is NaN on every axis
struct NanEvaluator;

#[async_trait]
impl QualityEvaluator for NanEvaluator {
    fn name(&self) -> &str {
        "nan"
    }

    async fn evaluate(&self, _input: EvaluationInput<'_>) -> Result<QualityScore, EvaluationError> {
        Ok(QualityScore {
            accuracy: f64::NAN,
            tone: f64::NAN,
            clarity: f64::NAN,
            overall: f64::NAN,
            feedback: vec![],
            source: ScoreSource::Agent,
        })
    }
}

/// Evaluator recording the changed paths it was given
#[derive(Default)]
struct ChangeSpyEvaluator {
    seen: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl QualityEvaluator for ChangeSpyEvaluator {
    fn name(&self) -> &str {
        "change-spy"
    }

    async fn evaluate(&self, input: EvaluationInput<'_>) -> Result<QualityScore, EvaluationError> {
        let paths = input.change.paths().map(String::from).collect();
        self.seen.lock().unwrap().push(paths);
        Ok(QualityScore::new(1.0, 1.0, 1.0, vec![], ScoreSource::Agent))
    }
}

/// Drafter attaching an unrelated change to its draft
struct ChangeSwappingDrafter;

#[async_trait]
impl DraftGenerator for ChangeSwappingDrafter {
    fn name(&self) -> &str {
        "swapping"
    }

    async fn draft(&self, request: DraftRequest<'_>) -> Result<Draft, DraftError> {
        Ok(Draft {
            content: "# Docs".to_string(),
            iteration: request.next_iteration(),
            change: Arc::new(StructuredChange::default()),
            fallback: false,
        })
    }
}

struct SlowEvaluator;

#[async_trait]
impl QualityEvaluator for SlowEvaluator {
    fn name(&self) -> &str {
        "slow"
    }

    async fn evaluate(&self, _input: EvaluationInput<'_>) -> Result<QualityScore, EvaluationError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(QualityScore::new(1.0, 1.0, 1.0, vec![], ScoreSource::Agent))
    }
}

/// Runner failing every snippet with a fixed error
struct FailingRunner {
    error: String,
}

#[async_trait]
impl SnippetRunner for FailingRunner {
    fn name(&self) -> &str {
        "failing"
    }

    async fn run(&self, snippet: &CodeSnippet) -> ExecutionResult {
        ExecutionResult::failure(snippet, String::new(), self.error.clone())
    }
}

struct SlowRunner;

#[async_trait]
impl SnippetRunner for SlowRunner {
    fn name(&self) -> &str {
        "slow"
    }

    async fn run(&self, snippet: &CodeSnippet) -> ExecutionResult {
        tokio::time::sleep(Duration::from_secs(30)).await;
        ExecutionResult::success(snippet, String::new())
    }
}

struct BrokenStructurer;

#[async_trait]
impl ChangeStructurer for BrokenStructurer {
    fn name(&self) -> &str {
        "broken"
    }

    async fn structure(&self, _raw_change: &str) -> Result<StructuredChange, StructureError> {
        Err(StructureError::Unavailable("analyser offline".into()))
    }
}

const DIFF: &str = "diff --git a/src/calc.py b/src/calc.py
--- a/src/calc.py
+++ b/src/calc.py
@@ -1 +1,2 @@
-def add(a, b): return a - b
+def add(a, b):
+    return a + b
";

fn build(stages: Stages, config: LoopConfig) -> CorrectionLoop {
    CorrectionLoop::new(stages, config, Arc::new(Logger::quiet())).unwrap()
}

// ============================================================
// Acceptance and degradation
// ============================================================

#[tokio::test]
async fn test_accepts_on_first_iteration() {
    let drafter = RecordingDrafter::new("# Draft {n}");
    let stages = Stages::local()
        .with_drafter(drafter.clone())
        .with_evaluator(ScriptedEvaluator::new(&[0.9]));
    let outcome = build(stages, LoopConfig::default())
        .run(RunInput::new(DIFF))
        .await;

    assert!(outcome.is_accepted());
    assert_eq!(outcome.iterations(), 1);
    assert_eq!(outcome.content(), Some("# Draft 1"));
    assert_eq!(outcome.doc_path(), Some("src/DOCUMENTATION.md"));
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(drafter.seen().len(), 1);
    assert_eq!(drafter.seen()[0].paths, vec!["src/calc.py"]);
}

#[tokio::test]
async fn test_degrades_to_highest_scoring_draft() {
    let drafter = RecordingDrafter::new("# Draft {n}");
    let stages = Stages::local()
        .with_drafter(drafter.clone())
        .with_evaluator(ScriptedEvaluator::new(&[0.3, 0.6, 0.2]));
    let config = LoopConfig::default()
        .with_threshold(0.7)
        .with_max_attempts(3);
    let outcome = build(stages, config).run(RunInput::new(DIFF)).await;

    match &outcome {
        LoopOutcome::Degraded {
            content,
            score,
            iterations,
            best_iteration,
            history,
            ..
        } => {
            assert_eq!(content, "# Draft 2");
            assert!((score.overall - 0.6).abs() < 1e-9);
            assert_eq!(*iterations, 3);
            assert_eq!(*best_iteration, 2);
            assert_eq!(history.len(), 3);
        }
        other => panic!("expected degraded, got {}", other.tag()),
    }
    assert_eq!(outcome.exit_code(), 1);

    let seen = drafter.seen();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[1].previous_iteration, Some(1));
    assert_eq!(seen[1].feedback, vec!["feedback for iteration 1"]);
    assert_eq!(seen[2].previous_iteration, Some(2));
}

#[tokio::test]
async fn test_nan_score_never_becomes_best() {
    let stages = Stages::local()
        .with_drafter(RecordingDrafter::new("# Draft {n}"))
        .with_evaluator(ScriptedEvaluator::new(&[f64::NAN, 0.5]));
    let config = LoopConfig::default()
        .with_threshold(0.7)
        .with_max_attempts(2);
    let outcome = build(stages, config).run(RunInput::new(DIFF)).await;

    match &outcome {
        LoopOutcome::Degraded {
            content,
            score,
            best_iteration,
            ..
        } => {
            assert_eq!(content, "# Draft 2");
            assert_eq!(*best_iteration, 2);
            assert!((score.overall - 0.5).abs() < 1e-9);
        }
        other => panic!("expected degraded, got {}", other.tag()),
    }
    assert!(outcome.history().iter().all(|r| r.overall.is_finite()));
}

#[tokio::test]
async fn test_non_finite_score_falls_back_to_heuristic() {
    let stages = Stages::local()
        .with_drafter(RecordingDrafter::new("# Draft {n}"))
        .with_evaluator(Arc::new(NanEvaluator));
    let outcome = build(stages, LoopConfig::default().with_max_attempts(1))
        .run(RunInput::new(DIFF))
        .await;

    let history = outcome.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].score_source, ScoreSource::Heuristic);
    assert!(history[0].overall.is_finite());
    assert!(outcome.score().unwrap().is_finite());
}

#[tokio::test]
async fn test_evaluator_sees_the_structured_change() {
    let evaluator = Arc::new(ChangeSpyEvaluator::default());
    let stages = Stages::local()
        .with_drafter(Arc::new(ChangeSwappingDrafter))
        .with_evaluator(evaluator.clone());
    let outcome = build(stages, LoopConfig::default())
        .run(RunInput::new(DIFF))
        .await;

    assert!(outcome.is_accepted());
    assert_eq!(outcome.doc_path(), Some("src/DOCUMENTATION.md"));
    assert_eq!(
        *evaluator.seen.lock().unwrap(),
        vec![vec!["src/calc.py".to_string()]]
    );
}

#[tokio::test]
async fn test_iterations_never_exceed_max_attempts() {
    let drafter = RecordingDrafter::new("draft");
    let stages = Stages::local()
        .with_drafter(drafter.clone())
        .with_evaluator(ScriptedEvaluator::new(&[0.0; 5]));
    let outcome = build(stages, LoopConfig::default().with_max_attempts(5))
        .run(RunInput::new(DIFF))
        .await;

    assert_eq!(outcome.tag(), "degraded");
    assert_eq!(outcome.iterations(), 5);
    assert_eq!(drafter.seen().len(), 5);
}

#[tokio::test]
async fn test_empty_draft_is_still_evaluated() {
    let stages = Stages::local()
        .with_drafter(RecordingDrafter::new(""))
        .with_evaluator(ScriptedEvaluator::new(&[1.0]));
    let outcome = build(stages, LoopConfig::default())
        .run(RunInput::new(DIFF))
        .await;

    assert!(outcome.is_accepted());
    assert_eq!(outcome.content(), Some(""));
}

// ============================================================
// Snippet validation feedback
// ============================================================

#[tokio::test]
async fn test_snippet_failures_reach_next_draft_verbatim() {
    let error = "Traceback (most recent call last):\n  File \"snippet.py\", line 1, in <module>\nValueError: bad input\n";
    let drafter = RecordingDrafter::new("# Draft {n}\n\n```python\nadd(1, 2)\n```\n");
    let stages = Stages::local()
        .with_drafter(drafter.clone())
        .with_runner(Arc::new(FailingRunner {
            error: error.to_string(),
        }))
        .with_evaluator(ScriptedEvaluator::new(&[0.4, 0.9]));
    let outcome = build(stages, LoopConfig::default())
        .run(RunInput::new(DIFF))
        .await;

    assert!(outcome.is_accepted());
    assert_eq!(outcome.iterations(), 2);

    let seen = drafter.seen();
    assert!(seen[0].failing_errors.is_empty());
    assert_eq!(seen[1].failing_errors, vec![error.to_string()]);
    assert_eq!(outcome.history()[0].snippets_failed, 1);
}

#[tokio::test]
async fn test_all_skipped_snippets_keep_full_accuracy() {
    let stages = Stages::local()
        .with_drafter(RecordingDrafter::new(
            "# Notes\n\n```haskell\nmain = pure ()\n```\n\n```text\noutput\n```\n",
        ))
        .with_runner(Arc::new(LocalRunner::empty()));
    let outcome = build(stages, LoopConfig::default())
        .run(RunInput::new(""))
        .await;

    let score = outcome.score().unwrap();
    assert_eq!(score.source, ScoreSource::Heuristic);
    assert_eq!(score.accuracy, 1.0);
    assert_eq!(outcome.history()[0].snippets_skipped, 2);
}

// ============================================================
// Malformed input and stage failures
// ============================================================

#[tokio::test]
async fn test_garbage_input_still_produces_documentation() {
    let outcome = build(Stages::local(), LoopConfig::default())
        .run(RunInput::new("\u{0}\u{1} not a diff at all"))
        .await;

    assert_ne!(outcome.tag(), "cancelled");
    assert!(outcome.content().unwrap().contains("## <unparsed>"));
}

#[tokio::test]
async fn test_empty_input_still_produces_documentation() {
    let outcome = build(Stages::local(), LoopConfig::default())
        .run(RunInput::new("   \n"))
        .await;

    assert!(outcome
        .content()
        .unwrap()
        .contains("No code changes detected."));
}

#[tokio::test]
async fn test_structurer_failure_uses_synthetic_change() {
    let drafter = RecordingDrafter::new("# Draft");
    let stages = Stages::local()
        .with_structurer(Arc::new(BrokenStructurer))
        .with_drafter(drafter.clone())
        .with_evaluator(ScriptedEvaluator::new(&[1.0]));
    let outcome = build(stages, LoopConfig::default())
        .run(RunInput::new(DIFF))
        .await;

    assert!(outcome.is_accepted());
    assert!(drafter.seen()[0].synthetic_change);
}

#[tokio::test]
async fn test_evaluator_error_falls_back_to_heuristic() {
    // Script has one score; the second evaluation errors
    let stages = Stages::local()
        .with_drafter(RecordingDrafter::new("draft"))
        .with_evaluator(ScriptedEvaluator::new(&[0.1]));
    let outcome = build(stages, LoopConfig::default().with_max_attempts(2))
        .run(RunInput::new(DIFF))
        .await;

    let history = outcome.history();
    assert_eq!(history[0].score_source, ScoreSource::Agent);
    assert_eq!(history[1].score_source, ScoreSource::Heuristic);
}

#[tokio::test]
async fn test_stage_timeouts_trigger_fallbacks() {
    let timeouts = StageTimeouts {
        structure: Duration::from_millis(200),
        draft: Duration::from_millis(50),
        snippet: Duration::from_millis(50),
        evaluate: Duration::from_millis(50),
    };
    let stages = Stages::local()
        .with_drafter(RecordingDrafter::slow(Duration::from_secs(30)))
        .with_runner(Arc::new(SlowRunner))
        .with_evaluator(Arc::new(SlowEvaluator));
    let config = LoopConfig::default()
        .with_threshold(0.0)
        .with_timeouts(timeouts);

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        build(stages, config).run(RunInput::new(DIFF)),
    )
    .await
    .expect("loop must not hang on slow stages");

    match &outcome {
        LoopOutcome::Accepted {
            content,
            fallback,
            score,
            history,
            ..
        } => {
            assert!(*fallback);
            assert!(content.starts_with("# Documentation Update"));
            assert_eq!(score.source, ScoreSource::Heuristic);
            // The template's added-code block was sent to the slow runner
            assert_eq!(history[0].snippets_skipped, 1);
        }
        other => panic!("expected accepted, got {}", other.tag()),
    }
}

// ============================================================
// Cancellation and isolation
// ============================================================

#[tokio::test]
async fn test_cancel_between_iterations() {
    let cancel = CancelHandle::new();
    let drafter = RecordingDrafter::new("# Draft {n}");
    let stages = Stages::local()
        .with_drafter(drafter.clone())
        .with_evaluator(ScriptedEvaluator::cancelling(0.1, cancel.clone()));
    let outcome = build(stages, LoopConfig::default())
        .run(RunInput::new(DIFF).with_cancel(cancel))
        .await;

    assert_eq!(outcome.tag(), "cancelled");
    assert_eq!(outcome.iterations(), 1);
    assert!(outcome.content().is_none());
    assert_eq!(outcome.exit_code(), 130);
    assert_eq!(drafter.seen().len(), 1);
}

#[tokio::test]
async fn test_cancel_before_start_drafts_nothing() {
    let cancel = CancelHandle::new();
    cancel.cancel();
    let drafter = RecordingDrafter::new("# Draft");
    let stages = Stages::local().with_drafter(drafter.clone());
    let outcome = build(stages, LoopConfig::default())
        .run(RunInput::new(DIFF).with_cancel(cancel))
        .await;

    assert_eq!(outcome.tag(), "cancelled");
    assert_eq!(outcome.iterations(), 0);
    assert!(drafter.seen().is_empty());
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let stages = Stages::local()
        .with_drafter(RecordingDrafter::new("# Docs for {paths} (attempt {n})"))
        .with_evaluator(Arc::new(MarkerEvaluator { marker: "alpha.py" }));
    let correction_loop = build(stages, LoopConfig::default());

    let alpha = "diff --git a/alpha.py b/alpha.py\n--- a/alpha.py\n+++ b/alpha.py\n@@ -1 +1 @@\n-a\n+b\n";
    let beta = "diff --git a/beta.py b/beta.py\n--- a/beta.py\n+++ b/beta.py\n@@ -1 +1 @@\n-a\n+b\n";

    let (a, b) = tokio::join!(
        correction_loop.run(RunInput::new(alpha)),
        correction_loop.run(RunInput::new(beta)),
    );

    assert!(a.is_accepted());
    assert_eq!(a.iterations(), 1);
    assert_eq!(a.content(), Some("# Docs for alpha.py (attempt 1)"));

    assert_eq!(b.tag(), "degraded");
    assert_eq!(b.iterations(), 3);
    assert_eq!(b.content(), Some("# Docs for beta.py (attempt 1)"));
    assert!(!b.content().unwrap().contains("alpha"));
}

// ============================================================
// Configuration
// ============================================================

#[test]
fn test_invalid_config_is_rejected() {
    let logger = Arc::new(Logger::quiet());
    let err = CorrectionLoop::new(
        Stages::local(),
        LoopConfig::default().with_threshold(1.2),
        logger.clone(),
    )
    .err()
    .unwrap();
    assert_eq!(err, LoopError::InvalidThreshold(1.2));

    let err = CorrectionLoop::new(
        Stages::local(),
        LoopConfig::default().with_max_attempts(0),
        logger,
    )
    .err()
    .unwrap();
    assert_eq!(err, LoopError::ZeroMaxAttempts);
}
