//! Markdown code fence lines.

/// Backtick count of a fence line, `None` when the line opens no fence
pub fn fence_open(line: &str) -> Option<usize> {
    let ticks = leading_ticks(line.trim_start());
    (ticks >= 3).then_some(ticks)
}

/// Whether `line` closes a fence opened with `ticks` backticks: at least
/// as many backticks and nothing after them
pub fn fence_closes(line: &str, ticks: usize) -> bool {
    let trimmed = line.trim_start();
    let count = leading_ticks(trimmed);
    count >= ticks && trimmed[count..].trim().is_empty()
}

fn leading_ticks(line: &str) -> usize {
    line.chars().take_while(|c| *c == '`').count()
}
