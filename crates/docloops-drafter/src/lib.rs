//! # docloops-drafter
//!
//! Documentation drafts for a structured change.
//!
//! - [`AgentDrafter`] writes and revises drafts with a text-generation agent
//! - [`TemplateDrafter`] renders a deterministic draft from the change alone
//! - [`extract_snippets`] pulls the fenced code blocks out of a draft so
//!   they can be executed

mod draft;
mod generator;
mod prompts;
mod snippets;
mod template;

pub use draft::{Correction, Draft, DraftRequest};
pub use generator::{AgentDrafter, DraftError, DraftGenerator};
pub use prompts::DraftPrompts;
pub use snippets::extract_snippets;
pub use template::TemplateDrafter;
