use serde::{Deserialize, Serialize};

/// Path used for the synthetic entry of an unparseable change
pub const UNPARSED_PATH: &str = "<unparsed>";

/// Number of added lines kept per file for drafting
pub const ADDED_SAMPLE_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    /// Classify by total changed lines: under 10 is low, under 50 medium.
    pub fn from_line_count(total: usize) -> Self {
        if total < 10 {
            Complexity::Low
        } else if total < 50 {
            Complexity::Medium
        } else {
            Complexity::High
        }
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Low => write!(f, "low"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::High => write!(f, "high"),
        }
    }
}

/// One file's worth of a structured change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
    pub language: String,
    pub complexity: Complexity,
    pub summary: String,
    pub lines_added: usize,
    pub lines_removed: usize,
    /// First few added lines, for drafting context
    #[serde(default)]
    pub added_sample: Vec<String>,
}

impl FileChange {
    pub fn is_synthetic(&self) -> bool {
        self.path == UNPARSED_PATH
    }
}

/// Normalized, immutable view of a raw change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredChange {
    pub changes: Vec<FileChange>,
    /// True when produced by the fallback rather than a real analysis
    #[serde(default)]
    pub synthetic: bool,
}

impl StructuredChange {
    pub fn new(changes: Vec<FileChange>) -> Self {
        Self {
            changes,
            synthetic: false,
        }
    }

    /// Fallback used when a change cannot be analysed.
    ///
    /// Always has exactly one entry so drafting has something to describe.
    pub fn unparsed(raw: &str) -> Self {
        let lines = raw.lines().count();
        Self {
            changes: vec![FileChange {
                path: UNPARSED_PATH.to_string(),
                kind: ChangeKind::Modified,
                language: "unknown".to_string(),
                complexity: Complexity::from_line_count(lines),
                summary: format!("Unparsed change ({} lines)", lines),
                lines_added: 0,
                lines_removed: 0,
                added_sample: Vec::new(),
            }],
            synthetic: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Paths of real (non-synthetic) changed files
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.changes
            .iter()
            .filter(|c| !c.is_synthetic())
            .map(|c| c.path.as_str())
    }

    pub fn total_lines_added(&self) -> usize {
        self.changes.iter().map(|c| c.lines_added).sum()
    }

    pub fn total_lines_removed(&self) -> usize {
        self.changes.iter().map(|c| c.lines_removed).sum()
    }

    /// Where documentation for this change would naturally live.
    ///
    /// Next to the first changed file, at the root for top-level files,
    /// `README.md` when nothing changed.
    pub fn suggested_doc_path(&self) -> String {
        let Some(first) = self.paths().next() else {
            return "README.md".to_string();
        };
        match first.rsplit_once('/') {
            Some((dir, _)) if !dir.is_empty() => format!("{}/DOCUMENTATION.md", dir),
            _ => "DOCUMENTATION.md".to_string(),
        }
    }

    /// Pretty JSON used as prompt context
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Detect a language name from a file extension
pub fn detect_language(path: &str) -> &'static str {
    const EXTENSIONS: &[(&str, &str)] = &[
        (".py", "python"),
        (".js", "javascript"),
        (".ts", "typescript"),
        (".java", "java"),
        (".cpp", "cpp"),
        (".c", "c"),
        (".go", "go"),
        (".rs", "rust"),
        (".rb", "ruby"),
        (".php", "php"),
        (".sh", "bash"),
        (".md", "markdown"),
        (".json", "json"),
        (".yaml", "yaml"),
        (".yml", "yaml"),
    ];

    EXTENSIONS
        .iter()
        .find(|(ext, _)| path.ends_with(ext))
        .map(|(_, lang)| *lang)
        .unwrap_or("unknown")
}
