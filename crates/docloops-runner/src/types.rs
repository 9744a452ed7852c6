use serde::{Deserialize, Serialize};

/// Where a snippet sits in its draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnippetOrigin {
    /// Ordinal of the fenced block (0-indexed)
    pub index: usize,
    /// Line of the opening fence (1-indexed)
    pub line: usize,
}

impl std::fmt::Display for SnippetOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "snippet #{} (line {})", self.index + 1, self.line)
    }
}

/// A code block extracted from a draft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSnippet {
    pub language: String,
    pub source: String,
    pub origin: SnippetOrigin,
}

impl CodeSnippet {
    pub fn new(language: impl Into<String>, source: impl Into<String>, origin: SnippetOrigin) -> Self {
        Self {
            language: language.into(),
            source: source.into(),
            origin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success,
    Failure,
    /// Not executed: unsupported language, backend missing, or timed out
    Skipped,
}

/// Result of running one snippet in one iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub origin: SnippetOrigin,
    pub language: String,
    pub outcome: ExecutionOutcome,
    pub output: String,
    /// Error text, verbatim, for failures; the skip reason for skipped snippets
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(snippet: &CodeSnippet, output: String) -> Self {
        Self {
            origin: snippet.origin,
            language: snippet.language.clone(),
            outcome: ExecutionOutcome::Success,
            output,
            error: None,
        }
    }

    pub fn failure(snippet: &CodeSnippet, output: String, error: String) -> Self {
        Self {
            origin: snippet.origin,
            language: snippet.language.clone(),
            outcome: ExecutionOutcome::Failure,
            output,
            error: Some(error),
        }
    }

    pub fn skipped(snippet: &CodeSnippet, reason: impl Into<String>) -> Self {
        Self {
            origin: snippet.origin,
            language: snippet.language.clone(),
            outcome: ExecutionOutcome::Skipped,
            output: String::new(),
            error: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ExecutionOutcome::Success
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == ExecutionOutcome::Failure
    }

    pub fn is_skipped(&self) -> bool {
        self.outcome == ExecutionOutcome::Skipped
    }
}
