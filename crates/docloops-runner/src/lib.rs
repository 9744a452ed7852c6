//! # docloops-runner
//!
//! Validation of the code embedded in documentation drafts.
//!
//! A [`SnippetRunner`] never errors. It returns one [`ExecutionResult`]
//! per snippet: success, failure (with the error text verbatim) or
//! skipped when the snippet could not be run at all.

mod fence;
mod runner;
mod types;

pub use fence::{fence_closes, fence_open};
pub use runner::{Interpreter, LocalRunner, SnippetRunner};
pub use types::{CodeSnippet, ExecutionOutcome, ExecutionResult, SnippetOrigin};
