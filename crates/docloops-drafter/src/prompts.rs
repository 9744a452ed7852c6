use docloops_changes::StructuredChange;
use std::fmt::Write;

use crate::{Correction, Draft};

/// Prompt templates for the drafting agent
pub struct DraftPrompts;

impl DraftPrompts {
    /// Prompt for the first draft of a change
    pub fn initial(change: &StructuredChange) -> String {
        format!(
            r#"You are a senior technical writer. Write developer documentation for the code change below.

## Code Change
```json
{change}
```

## Requirements

1. Start with a top-level markdown heading naming what changed.
2. Describe every changed file by its path: what it does now and why a developer would care.
3. Document new or changed functions and methods: parameters, return values and error behaviour.
4. Include at least one short usage example in a fenced code block tagged with its language. Examples are executed as-is, so they must be self-contained and runnable.
5. Keep a professional, precise tone. Aim for 150 to 600 words.

Respond with the markdown document only, no preamble."#,
            change = change.to_prompt_json(),
        )
    }

    /// Prompt for revising a draft that fell short
    pub fn revision(change: &StructuredChange, previous: &Draft, correction: &Correction) -> String {
        let score = &correction.score;
        format!(
            r#"You are a senior technical writer revising documentation that did not pass review.

## Code Change
```json
{change}
```

## Previous Draft (iteration {iteration})
````markdown
{content}
````

## Review Score
- overall: {overall:.2}
- accuracy: {accuracy:.2}
- tone: {tone:.2}
- clarity: {clarity:.2}

## Reviewer Feedback
{feedback}

## Failing Code Examples
{failing}

---

Rewrite the document so it addresses every feedback item. Every failing code example must be fixed or replaced: it is executed as-is in an empty directory. Keep what already works.

Respond with the complete revised markdown document only, no preamble."#,
            change = change.to_prompt_json(),
            iteration = previous.iteration,
            content = previous.content,
            overall = score.overall,
            accuracy = score.accuracy,
            tone = score.tone,
            clarity = score.clarity,
            feedback = bullet_list(&score.feedback, "No specific feedback was given."),
            failing = failing_section(correction),
        )
    }
}

fn bullet_list(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn failing_section(correction: &Correction) -> String {
    if correction.failing.is_empty() {
        return "None.".to_string();
    }

    let mut out = String::new();
    for result in &correction.failing {
        let _ = write!(
            out,
            "### {} [{}]\n```text\n{}\n```\n",
            result.origin,
            result.language,
            result.error.as_deref().unwrap_or("").trim_end()
        );
    }
    out
}
