use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::types::{
    detect_language, ChangeKind, Complexity, FileChange, StructuredChange, ADDED_SAMPLE_LINES,
};

#[derive(Error, Debug)]
pub enum StructureError {
    #[error("Change analyser unavailable: {0}")]
    Unavailable(String),

    #[error("Change analysis failed: {0}")]
    Failed(String),
}

/// Turns raw change text into a [`StructuredChange`].
///
/// Implementations backed by an external analyser may fail; the loop
/// substitutes [`StructuredChange::unparsed`] when they do.
#[async_trait]
pub trait ChangeStructurer: Send + Sync {
    fn name(&self) -> &str;

    async fn structure(&self, raw_change: &str) -> Result<StructuredChange, StructureError>;
}

/// Local unified-diff parser. Never fails: input it cannot make sense of
/// becomes the synthetic unparsed change.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffStructurer;

impl DiffStructurer {
    pub fn new() -> Self {
        Self
    }

    /// Parse a unified diff synchronously
    pub fn parse(raw_change: &str) -> StructuredChange {
        if raw_change.trim().is_empty() {
            debug!("Empty change, nothing to structure");
            return StructuredChange::default();
        }

        let mut files = Vec::new();
        let mut current: Option<PendingFile> = None;
        let git_headers = raw_change.lines().any(|l| l.starts_with("diff --git"));

        let lines: Vec<&str> = raw_change.lines().collect();

        for (i, &line) in lines.iter().enumerate() {
            if line.starts_with("diff --git") {
                if let Some(file) = current.take() {
                    files.extend(file.finish());
                }
                current = Some(PendingFile::from_git_header(line));
                continue;
            }

            // Plain `---`/`+++` pairs start a file when there are no git headers.
            // Inside a counted hunk a `--- ` line is a removed line.
            let next = lines.get(i + 1).copied().unwrap_or("");
            if !git_headers
                && line.starts_with("--- ")
                && next.starts_with("+++ ")
                && current
                    .as_ref()
                    .map_or(true, |f| f.has_body && !f.in_counted_hunk())
            {
                if let Some(file) = current.take() {
                    files.extend(file.finish());
                }
                current = Some(PendingFile::default());
            }

            let Some(file) = current.as_mut() else {
                continue;
            };

            if file.has_body {
                file.body_line(line);
                continue;
            }

            if line.starts_with("new file mode") {
                file.kind = ChangeKind::Added;
            } else if line.starts_with("deleted file mode") {
                file.kind = ChangeKind::Deleted;
            } else if let Some(old) = line.strip_prefix("--- ") {
                if old.trim() == "/dev/null" {
                    file.kind = ChangeKind::Added;
                } else {
                    file.old_path = Some(strip_side_prefix(old));
                }
            } else if let Some(new) = line.strip_prefix("+++ ") {
                if new.trim() == "/dev/null" {
                    file.kind = ChangeKind::Deleted;
                } else {
                    file.new_path = Some(strip_side_prefix(new));
                }
            } else if line.starts_with("@@") {
                file.has_body = true;
                file.start_hunk(line);
            }
        }

        if let Some(file) = current.take() {
            files.extend(file.finish());
        }

        if files.is_empty() {
            debug!(
                len = raw_change.len(),
                "No file headers found, using unparsed fallback"
            );
            return StructuredChange::unparsed(raw_change);
        }

        debug!(files = files.len(), "Structured diff");
        StructuredChange::new(files)
    }
}

#[async_trait]
impl ChangeStructurer for DiffStructurer {
    fn name(&self) -> &str {
        "diff"
    }

    async fn structure(&self, raw_change: &str) -> Result<StructuredChange, StructureError> {
        Ok(Self::parse(raw_change))
    }
}

#[derive(Debug)]
struct PendingFile {
    header_path: Option<String>,
    old_path: Option<String>,
    new_path: Option<String>,
    kind: ChangeKind,
    added: Vec<String>,
    removed: usize,
    has_body: bool,
    /// Old and new lines left in the current hunk, from its `@@` header
    hunk_left: (usize, usize),
}

impl Default for PendingFile {
    fn default() -> Self {
        Self {
            header_path: None,
            old_path: None,
            new_path: None,
            kind: ChangeKind::Modified,
            added: Vec::new(),
            removed: 0,
            has_body: false,
            hunk_left: (0, 0),
        }
    }
}

impl PendingFile {
    fn from_git_header(line: &str) -> Self {
        // "diff --git a/path b/path"; only trusted when the headers below are missing
        let header_path = line
            .rsplit_once(" b/")
            .map(|(_, path)| path.trim().to_string())
            .filter(|p| !p.is_empty());
        Self {
            header_path,
            ..Default::default()
        }
    }

    fn in_counted_hunk(&self) -> bool {
        self.hunk_left != (0, 0)
    }

    /// A bare `@@` carries no counts; its hunk runs until the next header
    fn start_hunk(&mut self, line: &str) {
        self.hunk_left = parse_hunk_counts(line).unwrap_or((0, 0));
    }

    fn body_line(&mut self, line: &str) {
        let (old, new) = self.hunk_left;
        if line.starts_with("@@") {
            self.start_hunk(line);
        } else if let Some(added) = line.strip_prefix('+') {
            self.added.push(added.to_string());
            self.hunk_left = (old, new.saturating_sub(1));
        } else if line.starts_with('-') {
            self.removed += 1;
            self.hunk_left = (old.saturating_sub(1), new);
        } else if !line.starts_with('\\') {
            self.hunk_left = (old.saturating_sub(1), new.saturating_sub(1));
        }
    }

    fn finish(self) -> Option<FileChange> {
        let path = self.new_path.or(self.old_path).or(self.header_path)?;
        let lines_added = self.added.len();
        let lines_removed = self.removed;

        Some(FileChange {
            language: detect_language(&path).to_string(),
            complexity: Complexity::from_line_count(lines_added + lines_removed),
            summary: summarize(lines_added, lines_removed),
            kind: self.kind,
            lines_added,
            lines_removed,
            added_sample: self.added.into_iter().take(ADDED_SAMPLE_LINES).collect(),
            path,
        })
    }
}

fn strip_side_prefix(path: &str) -> String {
    let path = path.split('\t').next().unwrap_or(path).trim();
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
        .to_string()
}

/// Line counts of `@@ -a,b +c,d @@`; a missing count means one line
fn parse_hunk_counts(line: &str) -> Option<(usize, usize)> {
    let mut parts = line.split_whitespace().skip(1);
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;
    let count = |range: &str| match range.split_once(',') {
        Some((_, n)) => n.parse().ok(),
        None => range.parse::<usize>().ok().map(|_| 1),
    };
    Some((count(old)?, count(new)?))
}

fn summarize(added: usize, removed: usize) -> String {
    match (added, removed) {
        (0, 0) => "No changes detected".to_string(),
        (added, 0) => format!("Added {} lines", added),
        (0, removed) => format!("Removed {} lines", removed),
        (added, removed) => format!(
            "Modified: {} lines added, {} lines removed",
            added, removed
        ),
    }
}
