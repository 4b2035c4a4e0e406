//! Domain types for the SmartSight companion.
//!
//! This module contains the core data structures:
//! - Article: Paragraph records extracted from the page
//! - Artifact: Structured results of each analysis
//! - Events: Job lifecycle log

pub mod article;
pub mod artifact;
pub mod events;

// Re-export commonly used types
pub use article::{Article, PageId, Paragraph};
pub use artifact::{
    AdvancedReport, Artifact, BiasVerdict, CacheSlot, CitedAnalysis, EmotionTrace, JobKind,
    Leaning, OptionLetter, QuizItem, ScoreOrigin, Segment, Topic, TopicDistribution,
    TopicSlice, TrustBias, TrustRecord,
};
pub use events::{EventLog, JobEvent, JobEventType};
