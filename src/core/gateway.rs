//! Model gateway: scoped access to the language model.
//!
//! Each job kind acquires its own session seeded with its preamble. The
//! gateway checks availability once, retries session creation with linear
//! backoff and refuses a second session for a kind that already holds one.
//! Sessions are released when their guard is dropped.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::adapters::{
    LanguageModel, Message, ModelError, ModelSession, SessionOptions, TokenStream,
};
use crate::domain::{EventLog, JobEvent, JobEventType, JobKind};

use super::retry::RetryPolicy;

/// Entry point to the language model for every analysis job
#[derive(Clone)]
pub struct ModelGateway {
    model: Arc<dyn LanguageModel>,
    create_policy: RetryPolicy,
    active: Arc<Mutex<HashSet<JobKind>>>,
    events: EventLog,
}

impl ModelGateway {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        create_policy: RetryPolicy,
        events: EventLog,
    ) -> Self {
        Self {
            model,
            create_policy,
            active: Arc::new(Mutex::new(HashSet::new())),
            events,
        }
    }

    /// Name of the underlying model backend
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Whether a session is currently open for `kind`
    pub fn is_active(&self, kind: JobKind) -> bool {
        self.active.lock().contains(&kind)
    }

    /// Open a session for `kind` seeded with `preamble`
    #[instrument(skip(self, preamble), fields(kind = %kind))]
    pub async fn acquire(&self, kind: JobKind, preamble: &str) -> Result<SessionGuard, ModelError> {
        if !self.model.availability().await.is_usable() {
            debug!("Model capability unavailable");
            return Err(ModelError::CapabilityUnavailable);
        }

        if !self.active.lock().insert(kind) {
            return Err(ModelError::SessionBusy(kind.to_string()));
        }
        // Frees the kind again if creation never succeeds
        let claim = KindClaim {
            kind,
            active: Arc::clone(&self.active),
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self
                .model
                .create(SessionOptions::with_preamble(preamble))
                .await
            {
                Ok(session) => {
                    debug!(attempt, "Session created");
                    return Ok(SessionGuard {
                        kind,
                        session,
                        released: false,
                        _claim: claim,
                    });
                }
                Err(e) if self.create_policy.should_retry(attempt) => {
                    let delay = self.create_policy.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.create_policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Session creation failed, retrying"
                    );
                    self.events.append(
                        JobEvent::new(
                            kind,
                            JobEventType::Retrying,
                            format!("Session creation attempt {} failed", attempt),
                        )
                        .with_error(e.to_string()),
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Session creation failed, giving up");
                    return Err(ModelError::SessionCreateFailed {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}


struct KindClaim {
    kind: JobKind,
    active: Arc<Mutex<HashSet<JobKind>>>,
}

impl Drop for KindClaim {
    fn drop(&mut self) {
        self.active.lock().remove(&self.kind);
    }
}

/// An open session; released on drop
pub struct SessionGuard {
    kind: JobKind,
    session: Box<dyn ModelSession>,
    released: bool,
    _claim: KindClaim,
}

impl SessionGuard {
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub async fn ask(&self, text: &str) -> Result<String, ModelError> {
        self.session.prompt(&[Message::user(text)]).await
    }

    pub async fn ask_stream(&self, text: &str) -> Result<TokenStream, ModelError> {
        self.session.prompt_streaming(&[Message::user(text)]).await
    }

    /// Destroy the session now instead of at drop
    pub fn release(mut self) {
        self.destroy();
    }

    fn destroy(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.session.destroy() {
            debug!(kind = %self.kind, error = %e, "Session release failed");
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("kind", &self.kind)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::Matcher;
    use crate::adapters::{Availability, ScriptedModel};
    use std::time::Duration;

    fn gateway(model: Arc<ScriptedModel>) -> ModelGateway {
        ModelGateway::new(model, RetryPolicy::linear(5, 1000), EventLog::new())
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let model = Arc::new(ScriptedModel::new().respond(Matcher::Any, "hello"));
        let gateway = gateway(Arc::clone(&model));

        let session = gateway.acquire(JobKind::Bias, "preamble").await.unwrap();
        assert!(gateway.is_active(JobKind::Bias));
        assert_eq!(session.ask("hi").await.unwrap(), "hello");

        session.release();
        assert!(!gateway.is_active(JobKind::Bias));
        assert_eq!(model.stats().sessions_destroyed, 1);
    }

    #[tokio::test]
    async fn test_unavailable_fails_without_creating() {
        let model = Arc::new(ScriptedModel::new().with_availability(Availability::Unavailable));
        let gateway = gateway(Arc::clone(&model));

        let err = gateway.acquire(JobKind::Deep, "p").await.unwrap_err();
        assert!(matches!(err, ModelError::CapabilityUnavailable));
        assert_eq!(model.stats().create_attempts, 0);
        assert!(!gateway.is_active(JobKind::Deep));
    }

    #[tokio::test]
    async fn test_one_session_per_kind() {
        let model = Arc::new(ScriptedModel::new());
        let gateway = gateway(Arc::clone(&model));

        let first = gateway.acquire(JobKind::Quiz, "p").await.unwrap();
        let err = gateway.acquire(JobKind::Quiz, "p").await.unwrap_err();
        assert!(matches!(err, ModelError::SessionBusy(_)));

        // Other kinds are unaffected
        let _chat = gateway.acquire(JobKind::Chat, "p").await.unwrap();

        drop(first);
        assert!(gateway.acquire(JobKind::Quiz, "p").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_retries_with_linear_backoff() {
        let model = Arc::new(ScriptedModel::new().failing_creates(2));
        let events = EventLog::new();
        let gateway = ModelGateway::new(
            Arc::clone(&model) as Arc<dyn LanguageModel>,
            RetryPolicy::linear(5, 1000),
            events.clone(),
        );

        let start = tokio::time::Instant::now();
        let session = gateway.acquire(JobKind::Emotions, "p").await.unwrap();

        // 1s after the first failure, 2s after the second
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_millis(3100));
        assert_eq!(model.stats().create_attempts, 3);
        assert_eq!(events.count(JobKind::Emotions, JobEventType::Retrying), 2);
        drop(session);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_gives_up_after_max_attempts() {
        let model = Arc::new(ScriptedModel::new().failing_creates(10));
        let gateway = gateway(Arc::clone(&model));

        let err = gateway.acquire(JobKind::Bias, "p").await.unwrap_err();
        assert!(matches!(err, ModelError::SessionCreateFailed { attempts: 5, .. }));
        assert_eq!(model.stats().create_attempts, 5);
        assert!(!gateway.is_active(JobKind::Bias));
    }
}
