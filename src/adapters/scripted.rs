//! Deterministic in-process model.
//!
//! Answers prompts from an ordered rule list matched against the session
//! preamble or the latest user message. Counts every call so callers can
//! verify caching and session discipline.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{
    Availability, LanguageModel, Message, ModelError, ModelSession, Role, SessionOptions,
    TokenStream,
};

/// What a rule matches against
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Every prompt
    Any,
    /// Session preamble contains the text (case-insensitive)
    Preamble(String),
    /// Latest user message contains the text (case-insensitive)
    Prompt(String),
}

impl Matcher {
    fn matches(&self, preamble: &str, prompt: &str) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Preamble(needle) => contains_ignore_case(preamble, needle),
            Matcher::Prompt(needle) => contains_ignore_case(prompt, needle),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// A scripted reply
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    Fail(String),
}

impl From<&str> for ScriptedReply {
    fn from(text: &str) -> Self {
        ScriptedReply::Text(text.to_string())
    }
}

impl From<String> for ScriptedReply {
    fn from(text: String) -> Self {
        ScriptedReply::Text(text)
    }
}

struct Rule {
    matcher: Matcher,
    replies: Vec<ScriptedReply>,
    cursor: AtomicUsize,
}

impl Rule {
    /// Replies are served in order; the last one repeats
    fn next_reply(&self) -> ScriptedReply {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        let idx = idx.min(self.replies.len().saturating_sub(1));
        self.replies
            .get(idx)
            .cloned()
            .unwrap_or_else(|| ScriptedReply::Text(String::new()))
    }
}

#[derive(Default)]
struct Counters {
    prompts: AtomicUsize,
    streams: AtomicUsize,
    create_attempts: AtomicUsize,
    sessions_created: AtomicUsize,
    sessions_destroyed: AtomicUsize,
}

/// Snapshot of scripted model activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScriptedStats {
    pub prompts: usize,
    pub streams: usize,
    pub create_attempts: usize,
    pub sessions_created: usize,
    pub sessions_destroyed: usize,
}

impl ScriptedStats {
    /// Total prompt calls, one-shot and streaming
    pub fn model_calls(&self) -> usize {
        self.prompts + self.streams
    }
}

struct Shared {
    rules: Vec<Rule>,
    counters: Counters,
}

impl Shared {
    fn reply_for(&self, preamble: &str, prompt: &str) -> ScriptedReply {
        self.rules
            .iter()
            .find(|r| r.matcher.matches(preamble, prompt))
            .map(Rule::next_reply)
            .unwrap_or_else(|| ScriptedReply::Text(String::new()))
    }
}

/// Scripted language model
pub struct ScriptedModel {
    availability: Availability,
    create_failures: AtomicU32,
    shared: Arc<Shared>,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            availability: Availability::Available,
            create_failures: AtomicU32::new(0),
            shared: Arc::new(Shared {
                rules: Vec::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// Add a rule answering with a single reply
    pub fn respond(self, matcher: Matcher, reply: impl Into<ScriptedReply>) -> Self {
        self.respond_seq(matcher, vec![reply.into()])
    }

    /// Add a rule answering with replies in order (the last repeats)
    pub fn respond_seq(mut self, matcher: Matcher, replies: Vec<ScriptedReply>) -> Self {
        // Rules are only added while building, before any session exists
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.rules.push(Rule {
                matcher,
                replies,
                cursor: AtomicUsize::new(0),
            });
        }
        self
    }

    /// Report the given availability
    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    /// Fail the first `count` session creations
    pub fn failing_creates(self, count: u32) -> Self {
        self.create_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Current activity counters
    pub fn stats(&self) -> ScriptedStats {
        let c = &self.shared.counters;
        ScriptedStats {
            prompts: c.prompts.load(Ordering::SeqCst),
            streams: c.streams.load(Ordering::SeqCst),
            create_attempts: c.create_attempts.load(Ordering::SeqCst),
            sessions_created: c.sessions_created.load(Ordering::SeqCst),
            sessions_destroyed: c.sessions_destroyed.load(Ordering::SeqCst),
        }
    }
}

struct ScriptedSession {
    preamble: String,
    shared: Arc<Shared>,
}

impl ScriptedSession {
    fn reply(&self, messages: &[Message]) -> Result<String, ModelError> {
        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        match self.shared.reply_for(&self.preamble, prompt) {
            ScriptedReply::Text(text) => Ok(text),
            ScriptedReply::Fail(reason) => Err(ModelError::Transient(reason)),
        }
    }
}

#[async_trait]
impl ModelSession for ScriptedSession {
    async fn prompt(&self, messages: &[Message]) -> Result<String, ModelError> {
        self.shared.counters.prompts.fetch_add(1, Ordering::SeqCst);
        self.reply(messages)
    }

    async fn prompt_streaming(&self, messages: &[Message]) -> Result<TokenStream, ModelError> {
        self.shared.counters.streams.fetch_add(1, Ordering::SeqCst);
        let text = self.reply(messages)?;
        let tokens: Vec<Result<String, ModelError>> = text
            .split_inclusive(char::is_whitespace)
            .map(|t| Ok(t.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(tokens)))
    }

    fn destroy(&self) -> Result<(), ModelError> {
        self.shared
            .counters
            .sessions_destroyed
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn availability(&self) -> Availability {
        self.availability
    }

    async fn create(&self, options: SessionOptions) -> Result<Box<dyn ModelSession>, ModelError> {
        let counters = &self.shared.counters;
        counters.create_attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.create_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.create_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ModelError::Transient("session creation failed".to_string()));
        }

        counters.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            preamble: options.preamble().unwrap_or_default().to_string(),
            shared: Arc::clone(&self.shared),
        }))
    }
}
