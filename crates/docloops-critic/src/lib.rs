//! # docloops-critic
//!
//! Scores documentation drafts on accuracy, tone and clarity.
//!
//! [`AgentEvaluator`] asks a model for a `<score>` block;
//! [`HeuristicEvaluator`] is the deterministic local scorer used when no
//! model is configured or the model fails. Either way `overall` is the
//! equal-weighted mean of the three axes.

mod evaluator;
mod heuristic;
mod prompts;
mod score;

pub use evaluator::{AgentEvaluator, EvaluationError, EvaluationInput, QualityEvaluator};
pub use heuristic::HeuristicEvaluator;
pub use prompts::EvaluationPrompts;
pub use score::{QualityScore, ScoreParseError, ScoreSource};
