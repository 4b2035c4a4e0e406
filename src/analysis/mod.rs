//! Prompt construction and tolerant parsing for every analysis kind.
//!
//! Each submodule owns the prompts of one job kind and the parser that turns
//! the model's free-form reply into a domain artifact. Parsers never fail on
//! shape mismatch; they fall back to explicit per-kind defaults.

pub mod advanced;
pub mod bias;
pub mod chat;
pub mod deep;
pub mod emotion;
pub mod quiz;

use thiserror::Error;

use crate::adapters::ModelError;
use crate::domain::JobKind;

/// Errors surfaced by analysis jobs
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("could not parse {kind} output: {reason}")]
    ParseFailed { kind: JobKind, reason: String },

    #[error("paragraph [{index}] does not exist (article has {paragraphs})")]
    InvalidReference { index: usize, paragraphs: usize },
}

/// Remove fenced code blocks and inline code spans
pub fn strip_code(text: &str) -> String {
    let without_fences = static_regex!(r"```[\s\S]*?```").replace_all(text, "");
    static_regex!(r"`[^`]+`")
        .replace_all(&without_fences, "")
        .into_owned()
}
