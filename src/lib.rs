//! smartsight - On-page article companion
//!
//! Mounts an overlay on a news article and drives an on-device language
//! model to analyse it: political bias, a cited deep analysis, a
//! per-paragraph emotion trace, a comprehension quiz, grounded chat and a
//! topic / source-trust breakdown.
//!
//! # Architecture
//!
//! - `page`: The host document (paragraph nodes, layout, inline styles)
//! - `adapters`: Language model backends (local CLI, scripted)
//! - `analysis`: Prompts and tolerant parsers per job kind
//! - `core`: Model gateway, response cache, eligibility gate, controller
//! - `render`: Canvas display lists and HTML fragments
//! - `view`: Overlay state, scroll tracking, paragraph highlights
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Analyze a saved article page
//! smartsight analyze page.html --url https://news.example.com/article/budget
//!
//! # Whitelist a site
//! smartsight domains add news.example.com
//! ```

/// Lazily compiled regex for a literal pattern
macro_rules! static_regex {
    ($re:expr) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).expect("static regex"))
    }};
}

pub mod adapters;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod page;
pub mod render;
pub mod view;

// Re-export main types at crate root for convenience
pub use adapters::{CommandModel, LanguageModel, ScriptedModel};
pub use core::{Activation, Companion, ModelGateway, ResponseCache, WhitelistStore};
pub use domain::{Article, Artifact, EventLog, JobEvent, JobEventType, JobKind, Paragraph};
pub use page::{Document, StaticDocument};
pub use view::{Tab, ViewState};
