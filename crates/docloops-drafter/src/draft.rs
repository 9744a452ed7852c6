use docloops_changes::StructuredChange;
use docloops_critic::QualityScore;
use docloops_runner::ExecutionResult;
use std::sync::Arc;

/// One documentation draft produced in one iteration
#[derive(Debug, Clone)]
pub struct Draft {
    pub content: String,
    /// 1-based
    pub iteration: usize,
    pub change: Arc<StructuredChange>,
    /// True when produced by the template fallback
    pub fallback: bool,
}

/// What the next revision has to fix
#[derive(Debug, Clone)]
pub struct Correction {
    pub score: QualityScore,
    /// Failed snippet results of the previous iteration, errors verbatim
    pub failing: Vec<ExecutionResult>,
}

impl Correction {
    /// Keeps only the failed results
    pub fn new(score: QualityScore, results: impl IntoIterator<Item = ExecutionResult>) -> Self {
        Self {
            score,
            failing: results.into_iter().filter(|r| r.is_failure()).collect(),
        }
    }
}

/// Input to a drafting call
#[derive(Debug, Clone, Copy)]
pub struct DraftRequest<'a> {
    pub change: &'a Arc<StructuredChange>,
    pub previous: Option<&'a Draft>,
    pub correction: Option<&'a Correction>,
}

impl<'a> DraftRequest<'a> {
    pub fn initial(change: &'a Arc<StructuredChange>) -> Self {
        Self {
            change,
            previous: None,
            correction: None,
        }
    }

    pub fn revision(
        change: &'a Arc<StructuredChange>,
        previous: &'a Draft,
        correction: &'a Correction,
    ) -> Self {
        Self {
            change,
            previous: Some(previous),
            correction: Some(correction),
        }
    }

    pub fn is_revision(&self) -> bool {
        self.previous.is_some()
    }

    /// Iteration number the resulting draft will carry
    pub fn next_iteration(&self) -> usize {
        self.previous.map_or(1, |d| d.iteration + 1)
    }
}
