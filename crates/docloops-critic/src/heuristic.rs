use async_trait::async_trait;
use docloops_runner::{fence_closes, fence_open, ExecutionResult};

use crate::{EvaluationError, EvaluationInput, QualityEvaluator, QualityScore, ScoreSource};

const PROFESSIONAL_TERMS: &[&str] = &["function", "method", "parameter", "returns", "example"];
const INFORMAL_TERMS: &[&str] = &["gonna", "wanna", "kinda", "yeah", "stuff"];

/// Axis value below which a feedback line is emitted
const FEEDBACK_FLOOR: f64 = 0.7;

const MIN_WORDS: usize = 50;
const MAX_WORDS: usize = 1000;

/// Deterministic scorer that needs no external service.
///
/// Also the fallback whenever the configured evaluator fails or times out.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEvaluator;

impl HeuristicEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, input: EvaluationInput<'_>) -> QualityScore {
        let lower = input.draft.to_lowercase();

        let execution = execution_ratio(input.results);
        let coverage = path_coverage(input.draft, input.change.paths());
        let accuracy = 0.6 * execution + 0.4 * coverage;

        let professional = PROFESSIONAL_TERMS
            .iter()
            .filter(|t| lower.contains(*t))
            .count();
        let informal = INFORMAL_TERMS.iter().filter(|t| lower.contains(*t)).count();
        let tone = 0.8 + 0.04 * professional as f64 - 0.1 * informal as f64;

        let words = input.draft.split_whitespace().count();
        let mut clarity = 0.5;
        if has_heading(input.draft) {
            clarity += 0.2;
        }
        if input.draft.contains("```") || lower.contains("example") {
            clarity += 0.15;
        }
        if (MIN_WORDS..=MAX_WORDS).contains(&words) {
            clarity += 0.15;
        }

        let mut score = QualityScore::new(accuracy, tone, clarity, Vec::new(), ScoreSource::Heuristic);
        score.feedback = feedback(&score, coverage, informal, words, input.results);
        score
    }
}

#[async_trait]
impl QualityEvaluator for HeuristicEvaluator {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn evaluate(&self, input: EvaluationInput<'_>) -> Result<QualityScore, EvaluationError> {
        Ok(self.score(input))
    }
}

/// Successes over executed snippets; skipped ones are not counted
fn execution_ratio(results: &[ExecutionResult]) -> f64 {
    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let failed = results.iter().filter(|r| r.is_failure()).count();
    match succeeded + failed {
        0 => 1.0,
        executed => succeeded as f64 / executed as f64,
    }
}

fn path_coverage<'a>(draft: &str, paths: impl Iterator<Item = &'a str>) -> f64 {
    let (total, mentioned) = paths.fold((0usize, 0usize), |(total, mentioned), path| {
        (total + 1, mentioned + usize::from(draft.contains(path)))
    });
    match total {
        0 => 1.0,
        _ => mentioned as f64 / total as f64,
    }
}

/// A markdown heading outside any fenced block
fn has_heading(draft: &str) -> bool {
    // Backtick count of the open fence
    let mut fence: Option<usize> = None;
    for line in draft.lines() {
        match fence {
            Some(ticks) => {
                if fence_closes(line, ticks) {
                    fence = None;
                }
            }
            None => {
                if let Some(ticks) = fence_open(line) {
                    fence = Some(ticks);
                } else if line.trim_start().starts_with('#') {
                    return true;
                }
            }
        }
    }
    false
}

fn feedback(
    score: &QualityScore,
    coverage: f64,
    informal: usize,
    words: usize,
    results: &[ExecutionResult],
) -> Vec<String> {
    let mut lines = Vec::new();

    if score.accuracy < FEEDBACK_FLOOR {
        if coverage < 1.0 {
            lines.push(
                "Accuracy: not every changed file is mentioned; describe each changed file by path"
                    .to_string(),
            );
        } else {
            lines.push("Accuracy: code examples fail to run; fix them so they execute".to_string());
        }
    }
    if score.tone < FEEDBACK_FLOOR {
        lines.push(format!(
            "Tone: {} informal term(s) found; use precise, professional wording",
            informal
        ));
    }
    if score.clarity < FEEDBACK_FLOOR {
        lines.push(format!(
            "Clarity: add markdown headings and a concrete example; keep it between {} and {} words (currently {})",
            MIN_WORDS, MAX_WORDS, words
        ));
    }

    for result in results.iter().filter(|r| r.is_failure()) {
        let first_line = result
            .error
            .as_deref()
            .and_then(|e| e.lines().find(|l| !l.trim().is_empty()))
            .unwrap_or("no error output");
        lines.push(format!(
            "{} [{}] failed: {}",
            result.origin,
            result.language,
            first_line.trim()
        ));
    }

    lines
}
