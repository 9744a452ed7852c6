use async_trait::async_trait;
use docloops_changes::StructuredChange;
use std::fmt::Write;

use crate::{Draft, DraftError, DraftGenerator, DraftRequest};

/// Deterministic drafter built only from the structured change.
///
/// Used directly when no agent is configured, and as the fallback when
/// the configured drafter fails or times out.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateDrafter;

impl TemplateDrafter {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, request: DraftRequest<'_>) -> Draft {
        Draft {
            content: Self::render(request.change),
            iteration: request.next_iteration(),
            change: request.change.clone(),
            fallback: true,
        }
    }

    pub fn render(change: &StructuredChange) -> String {
        let mut out = String::from("# Documentation Update\n\n");

        if change.is_empty() {
            out.push_str("No code changes detected.\n");
            return out;
        }

        let _ = writeln!(
            out,
            "This update touches {} file(s) with {} line(s) added and {} removed.",
            change.len(),
            change.total_lines_added(),
            change.total_lines_removed()
        );

        for file in &change.changes {
            let _ = write!(
                out,
                "\n## {path}\n\n\
                 - **Change type:** {kind}\n\
                 - **Summary:** {summary}\n\
                 - **Language:** {language}\n\
                 - **Complexity:** {complexity}\n\
                 - **Lines:** +{added} / -{removed}\n",
                path = file.path,
                kind = file.kind,
                summary = file.summary,
                language = file.language,
                complexity = file.complexity,
                added = file.lines_added,
                removed = file.lines_removed,
            );

            if !file.added_sample.is_empty() {
                out.push_str("\n### Added Code\n\n```diff\n");
                for line in &file.added_sample {
                    let _ = writeln!(out, "+{}", line);
                }
                out.push_str("```\n");
            }
        }

        out
    }
}

#[async_trait]
impl DraftGenerator for TemplateDrafter {
    fn name(&self) -> &str {
        "template"
    }

    async fn draft(&self, request: DraftRequest<'_>) -> Result<Draft, DraftError> {
        Ok(self.build(request))
    }
}
