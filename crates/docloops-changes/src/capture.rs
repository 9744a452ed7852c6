use git2::{DiffOptions, Repository, Tree};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git operation failed: {0}")]
    GitOperationFailed(#[from] git2::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Summary of diff statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
}

/// Reads the working-tree change of a repository as raw diff text.
///
/// This is how the CLI obtains a change when none is passed explicitly.
pub struct DiffCapture {
    include_untracked: bool,
}

impl Default for DiffCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffCapture {
    pub fn new() -> Self {
        Self {
            include_untracked: true,
        }
    }

    pub fn with_untracked(mut self, include: bool) -> Self {
        self.include_untracked = include;
        self
    }

    /// Unified diff of HEAD against the working tree (index included)
    pub fn capture_diff(&self, working_dir: &Path) -> Result<String, GitError> {
        let repo = Repository::discover(working_dir)?;
        let head_tree = head_tree(&repo)?;
        self.render(&repo, head_tree.as_ref())
    }

    /// Unified diff of `base` (a branch, tag or commit) against the working
    /// tree, i.e. everything the working tree adds on top of `base`
    pub fn capture_diff_against(&self, working_dir: &Path, base: &str) -> Result<String, GitError> {
        let repo = Repository::discover(working_dir)?;
        let base_tree = repo.revparse_single(base)?.peel_to_tree()?;
        debug!(base, "Diffing against base");
        self.render(&repo, Some(&base_tree))
    }

    fn render(&self, repo: &Repository, tree: Option<&Tree<'_>>) -> Result<String, GitError> {
        let mut opts = self.diff_options();
        let diff = repo.diff_tree_to_workdir_with_index(tree, Some(&mut opts))?;

        let mut diff_text = String::new();
        diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
            // File and hunk headers carry their own text; body lines need the origin marker
            if matches!(line.origin(), '+' | '-' | ' ') {
                diff_text.push(line.origin());
            }
            if let Ok(content) = std::str::from_utf8(line.content()) {
                diff_text.push_str(content);
            }
            true
        })?;

        debug!(diff_len = diff_text.len(), "Captured git diff");

        Ok(diff_text)
    }

    /// Get a summary of changes (for logging)
    pub fn capture_summary(&self, working_dir: &Path) -> Result<DiffSummary, GitError> {
        let repo = Repository::discover(working_dir)?;
        let head_tree = head_tree(&repo)?;

        let mut opts = self.diff_options();
        let diff = repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;
        let stats = diff.stats()?;

        Ok(DiffSummary {
            files_changed: stats.files_changed(),
            insertions: stats.insertions(),
            deletions: stats.deletions(),
        })
    }

    fn diff_options(&self) -> DiffOptions {
        let mut opts = DiffOptions::new();
        opts.include_untracked(self.include_untracked)
            .recurse_untracked_dirs(true)
            .show_untracked_content(self.include_untracked);
        opts
    }
}

/// HEAD's tree, or `None` for a repository without commits
fn head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, GitError> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_tree()?)),
        Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(None),
        Err(e) => Err(GitError::GitOperationFailed(e)),
    }
}
