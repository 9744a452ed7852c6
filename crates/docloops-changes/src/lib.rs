//! # docloops-changes
//!
//! Turns a code change into the structured form the drafting stage works
//! from.
//!
//! ## Key Types
//!
//! - [`StructuredChange`] / [`FileChange`] - per-file kind, language,
//!   complexity and summary
//! - [`ChangeStructurer`] - the stage interface
//! - [`DiffStructurer`] - local unified-diff parser, never fails
//! - [`DiffCapture`] - reads the working-tree diff of a git repository
//!
//! Input the parser cannot recognise still produces a change: a single
//! synthetic entry (see [`StructuredChange::unparsed`]).

mod capture;
mod structurer;
mod types;

pub use capture::{DiffCapture, DiffSummary, GitError};
pub use structurer::{ChangeStructurer, DiffStructurer, StructureError};
pub use types::{
    detect_language, ChangeKind, Complexity, FileChange, StructuredChange, ADDED_SAMPLE_LINES,
    UNPARSED_PATH,
};
