//! # docloops-core
//!
//! The self-correcting documentation loop.
//!
//! [`CorrectionLoop::run`] structures a change once, then drafts,
//! executes the draft's code snippets, and scores the result. A score at
//! or above the threshold is accepted; otherwise the score's feedback and
//! the failing snippets go back to the drafter until the attempt budget is
//! spent, at which point the best draft so far is returned as degraded.
//!
//! Every stage call has its own timeout. A stage that errors or times out
//! is replaced by its local fallback, so a run always ends in a
//! [`LoopOutcome`].

mod cancel;
mod config;
mod error;
mod loop_runner;
mod outcome;
mod state;

pub use cancel::CancelHandle;
pub use config::{LoopConfig, StageTimeouts, DEFAULT_MAX_ATTEMPTS, DEFAULT_THRESHOLD};
pub use error::LoopError;
pub use loop_runner::{CorrectionLoop, RunInput, Stages};
pub use outcome::LoopOutcome;
pub use state::{IterationRecord, LoopState};
