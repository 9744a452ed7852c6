use docloops_runner::{fence_closes, fence_open, CodeSnippet, SnippetOrigin};

/// Extract every fenced code block from markdown.
///
/// The language is the first word of the info string (`text` when there
/// is none). A block closes on a line of at least as many backticks as
/// opened it; unterminated blocks are dropped.
pub fn extract_snippets(content: &str) -> Vec<CodeSnippet> {
    let mut snippets = Vec::new();
    let mut open: Option<(usize, String, usize)> = None;
    let mut body: Vec<&str> = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let Some(fence) = open.as_ref().map(|(ticks, _, _)| *ticks) else {
            if let Some(ticks) = fence_open(line) {
                let language = line.trim_start()[ticks..]
                    .split_whitespace()
                    .next()
                    .unwrap_or("text")
                    .to_string();
                open = Some((ticks, language, idx + 1));
                body.clear();
            }
            continue;
        };

        if !fence_closes(line, fence) {
            body.push(line);
        } else if let Some((_, language, line_no)) = open.take() {
            let origin = SnippetOrigin {
                index: snippets.len(),
                line: line_no,
            };
            snippets.push(CodeSnippet::new(language, body.join("\n"), origin));
        }
    }

    snippets
}
