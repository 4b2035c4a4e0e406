//! Adapter interfaces for the on-device language model.
//!
//! Adapters provide a unified interface over whatever model capability the
//! host exposes: a local model CLI, or a scripted model for tests and demos.

pub mod command;
pub mod scripted;

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use command::CommandModel;
pub use scripted::{ScriptedModel, ScriptedStats};

/// Lazy sequence of tokens produced by a streaming prompt.
///
/// Dropping the stream cancels the underlying generation.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

/// Availability of the model capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Ready to create sessions
    Available,

    /// Can be used once the host downloads the model
    Downloadable,

    /// Download in progress
    Downloading,

    /// Not usable on this device
    Unavailable,
}

impl Availability {
    /// Anything but `Unavailable` may still produce a session
    pub fn is_usable(&self) -> bool {
        !matches!(self, Availability::Unavailable)
    }
}

/// Role of a message in a session transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message exchanged with a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Options used when creating a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Messages seeded into the session before any prompt (the preamble)
    pub initial_prompts: Vec<Message>,
}

impl SessionOptions {
    /// Session seeded with a single system preamble
    pub fn with_preamble(preamble: impl Into<String>) -> Self {
        Self {
            initial_prompts: vec![Message::system(preamble)],
        }
    }

    /// The system preamble, if any
    pub fn preamble(&self) -> Option<&str> {
        self.initial_prompts
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }
}

/// Errors surfaced by the model capability and the gateway
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("language model capability is unavailable")]
    CapabilityUnavailable,

    #[error("session creation failed after {attempts} attempts: {reason}")]
    SessionCreateFailed { attempts: u32, reason: String },

    #[error("a {0} session is already active")]
    SessionBusy(String),

    #[error("transient model failure: {0}")]
    Transient(String),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
}

/// An open model session seeded with a preamble
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// One-shot prompt returning the whole reply
    async fn prompt(&self, messages: &[Message]) -> Result<String, ModelError>;

    /// Streaming prompt returning a lazy token sequence
    async fn prompt_streaming(&self, messages: &[Message]) -> Result<TokenStream, ModelError>;

    /// Release resources held by the session
    fn destroy(&self) -> Result<(), ModelError>;
}

/// The host-provided language model capability
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Whether sessions can currently be created
    async fn availability(&self) -> Availability;

    /// Create a session seeded with the given options
    async fn create(&self, options: SessionOptions) -> Result<Box<dyn ModelSession>, ModelError>;
}

/// Drain a token stream, calling `on_partial` with the accumulated text after
/// every token.
pub async fn collect_stream<F>(
    mut stream: TokenStream,
    mut on_partial: F,
) -> Result<String, ModelError>
where
    F: FnMut(&str),
{
    let mut streamed = String::new();
    while let Some(token) = stream.next().await {
        streamed.push_str(&token?);
        on_partial(&streamed);
    }
    Ok(streamed)
}
