use docloops_runner::{ExecutionOutcome, ExecutionResult};

use crate::EvaluationInput;

/// Prompt templates for the quality evaluator
pub struct EvaluationPrompts;

impl EvaluationPrompts {
    /// Build the scoring prompt for one draft
    pub fn build_evaluation_prompt(input: EvaluationInput<'_>) -> String {
        format!(
            r#"You are a strict technical documentation reviewer. Score the documentation draft below against the code change it describes.

## Code Change
```json
{change}
```

## Documentation Draft (iteration {iteration})
````markdown
{draft}
````

## Code Snippet Execution Results
{results}

---

## Scoring Axes

Score each axis from 0.0 to 1.0:

1. **accuracy**: Does the draft describe the change correctly? Do its code examples run? A failed snippet is a strong signal of inaccuracy. Skipped snippets were not executed and must not be counted against the draft.
2. **tone**: Is the writing professional, precise and free of filler or slang?
3. **clarity**: Is it well structured with headings, concrete examples and a sensible length?

## Required Response Format

Briefly explain your assessment, then end your response with a score block:

<score>
{{"accuracy": 0.0, "tone": 0.0, "clarity": 0.0, "feedback": ["Specific, actionable improvement", "Another improvement"]}}
</score>

Feedback items must be concrete enough for the author to act on without seeing your explanation."#,
            change = truncate_output(&input.change.to_prompt_json(), 20000),
            iteration = input.iteration,
            draft = truncate_output(input.draft, 30000),
            results = format_results(input.results),
        )
    }
}

fn format_results(results: &[ExecutionResult]) -> String {
    if results.is_empty() {
        return "No code snippets in the draft.".to_string();
    }

    results
        .iter()
        .map(|r| {
            let status = match r.outcome {
                ExecutionOutcome::Success => "success",
                ExecutionOutcome::Failure => "FAILED",
                ExecutionOutcome::Skipped => "skipped",
            };
            match (&r.outcome, &r.error) {
                (ExecutionOutcome::Success, _) | (_, None) => {
                    format!("- {} [{}]: {}", r.origin, r.language, status)
                }
                (_, Some(error)) => format!(
                    "- {} [{}]: {}\n```\n{}\n```",
                    r.origin,
                    r.language,
                    status,
                    truncate_output(error.trim_end(), 2000)
                ),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate at a line boundary where possible, never inside a UTF-8 sequence
pub(crate) fn truncate_output(output: &str, max_len: usize) -> &str {
    if output.len() <= max_len {
        return output;
    }

    let mut cut = max_len;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }

    match output[..cut].rfind('\n') {
        Some(pos) => &output[..pos],
        None => &output[..cut],
    }
}
