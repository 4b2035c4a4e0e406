//! Grounded conversation about the article.
//!
//! The chat session is opened on the first turn with the article text in
//! its preamble and then kept for the rest of the page session, so later
//! turns see the whole conversation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::adapters::collect_stream;
use crate::core::gateway::{ModelGateway, SessionGuard};
use crate::domain::JobKind;

use super::AnalysisError;

/// Suggested questions offered under the chat box
pub const QUESTION_POOL: [&str; 9] = [
    "What's the main argument?",
    "Are there logical fallacies?",
    "What sources are cited?",
    "What perspective is missing?",
    "How credible is this?",
    "What's the broader context?",
    "Who would disagree?",
    "What questions remain?",
    "Who benefits from this view?",
];

/// Suggestions visible at once
pub const VISIBLE_SUGGESTIONS: usize = 3;

/// Chat preamble grounding the session in the article
pub fn preamble(article_text: &str) -> String {
    format!(
        "You are a helpful analyst. Answer questions about this article clearly and concisely.\n\nArticle:\n{}",
        article_text
    )
}

/// Rotating set of suggested questions, drawn without replacement
#[derive(Debug)]
pub struct SuggestionPool {
    remaining: Vec<String>,
    shown: Vec<String>,
    rng: StdRng,
}

impl SuggestionPool {
    /// Pool seeded from entropy
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Pool with a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let mut pool = Self {
            remaining: QUESTION_POOL.iter().map(|q| q.to_string()).collect(),
            shown: Vec::new(),
            rng,
        };
        pool.refill();
        pool
    }

    fn refill(&mut self) {
        while self.shown.len() < VISIBLE_SUGGESTIONS && !self.remaining.is_empty() {
            let idx = self.rng.gen_range(0..self.remaining.len());
            self.shown.push(self.remaining.swap_remove(idx));
        }
    }

    /// Currently visible suggestions
    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    /// Questions not yet shown
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Remove the visible suggestion at `index` and draw a replacement
    pub fn take(&mut self, index: usize) -> Option<String> {
        if index >= self.shown.len() {
            return None;
        }
        let question = self.shown.remove(index);
        self.refill();
        Some(question)
    }
}

impl Default for SuggestionPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Stateful chat over one article
pub struct ChatEngine {
    gateway: ModelGateway,
    article_text: String,
    session: Mutex<Option<SessionGuard>>,
}

impl ChatEngine {
    pub fn new(gateway: ModelGateway, article_text: String) -> Self {
        Self {
            gateway,
            article_text,
            session: Mutex::new(None),
        }
    }

    /// Whether the chat session has been opened
    pub async fn has_session(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Send one user turn, reporting the accumulated reply after every token.
    ///
    /// Turns are serialised: a second call waits for the first to finish.
    #[instrument(skip_all)]
    pub async fn send<F>(&self, message: &str, on_partial: F) -> Result<String, AnalysisError>
    where
        F: FnMut(&str),
    {
        let mut slot = self.session.lock().await;
        let session = match slot.as_mut() {
            Some(session) => session,
            None => {
                debug!("Opening chat session");
                let session = self
                    .gateway
                    .acquire(JobKind::Chat, &preamble(&self.article_text))
                    .await?;
                slot.insert(session)
            }
        };

        let stream = session.ask_stream(message).await?;
        Ok(collect_stream(stream, on_partial).await?)
    }

    /// Release the chat session
    pub async fn close(&self) {
        if let Some(session) = self.session.lock().await.take() {
            session.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::Matcher;
    use crate::adapters::ScriptedModel;
    use crate::core::retry::RetryPolicy;
    use crate::domain::EventLog;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_suggestions_are_distinct_and_rotate() {
        let mut pool = SuggestionPool::seeded(7);
        assert_eq!(pool.shown().len(), 3);
        assert_eq!(pool.remaining(), 6);

        let mut seen: HashSet<String> = pool.shown().iter().cloned().collect();
        assert_eq!(seen.len(), 3);

        let mut taken = Vec::new();
        while let Some(question) = pool.take(0) {
            taken.push(question);
            seen.extend(pool.shown().iter().cloned());
        }

        // Every question shown once, never repeated
        assert_eq!(taken.len(), 9);
        assert_eq!(taken.iter().collect::<HashSet<_>>().len(), 9);
        assert_eq!(seen.len(), 9);
        assert!(pool.shown().is_empty());
    }

    #[test]
    fn test_take_out_of_range() {
        let mut pool = SuggestionPool::seeded(1);
        assert!(pool.take(3).is_none());
        assert_eq!(pool.shown().len(), 3);
    }

    #[tokio::test]
    async fn test_session_opened_once_with_article() {
        let model = Arc::new(
            ScriptedModel::new()
                .respond(Matcher::Preamble("transit plan".into()), "It argues for **buses**."),
        );
        let gateway =
            ModelGateway::new(model.clone(), RetryPolicy::linear(5, 1000), EventLog::new());
        let chat = ChatEngine::new(gateway, "The city unveiled a transit plan.".into());

        let mut partials = 0;
        let reply = chat
            .send("What's the main argument?", |_| partials += 1)
            .await
            .unwrap();
        assert_eq!(reply, "It argues for **buses**.");
        assert!(partials > 1);

        chat.send("Anything else?", |_| {}).await.unwrap();
        assert_eq!(model.stats().sessions_created, 1);
        assert_eq!(model.stats().streams, 2);

        chat.close().await;
        assert!(!chat.has_session().await);
        assert_eq!(model.stats().sessions_destroyed, 1);
    }
}
