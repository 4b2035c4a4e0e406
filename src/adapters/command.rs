//! Local model adapter running an on-device model CLI.
//!
//! Every prompt spawns the configured command (e.g. `ollama run llama3.2`)
//! and pipes a role-tagged transcript to stdin. One-shot prompts collect
//! stdout; streaming prompts yield stdout line by line.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::debug;

use super::{
    Availability, LanguageModel, Message, ModelError, ModelSession, Role, SessionOptions,
    TokenStream,
};

/// Default local model command
pub const DEFAULT_COMMAND: &[&str] = &["ollama", "run", "llama3.2"];

#[derive(Debug)]
struct CommandSpec {
    program: String,
    args: Vec<String>,
    call_timeout: Duration,
}

/// Language model backed by a local subprocess
#[derive(Debug, Clone)]
pub struct CommandModel {
    spec: Arc<CommandSpec>,
}

impl Default for CommandModel {
    fn default() -> Self {
        let parts: Vec<String> = DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect();
        Self::from_command_line(&parts).unwrap_or_else(|| Self::new("ollama", Vec::new()))
    }
}

impl CommandModel {
    /// Create a command model with a program and its arguments
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            spec: Arc::new(CommandSpec {
                program: program.into(),
                args,
                call_timeout: Duration::from_secs(120),
            }),
        }
    }

    /// Build from a full command line (`program arg...`); `None` when empty
    pub fn from_command_line(parts: &[String]) -> Option<Self> {
        let (program, args) = parts.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    /// Override the per-call timeout for one-shot prompts
    pub fn with_timeout(self, call_timeout: Duration) -> Self {
        Self {
            spec: Arc::new(CommandSpec {
                program: self.spec.program.clone(),
                args: self.spec.args.clone(),
                call_timeout,
            }),
        }
    }

    /// The program that will be spawned
    pub fn program(&self) -> &str {
        &self.spec.program
    }
}

impl CommandSpec {
    fn spawn(&self, stderr: Stdio) -> Result<Child, ModelError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ModelError::Transient(format!("failed to spawn '{}': {}", self.program, e))
            })
    }

    async fn write_transcript(child: &mut Child, transcript: &str) -> Result<(), ModelError> {
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(transcript.as_bytes())
                .await
                .map_err(|e| ModelError::Transient(format!("failed to write model stdin: {}", e)))?;
            // Dropping stdin signals EOF
        }
        Ok(())
    }

    async fn run_to_completion(&self, transcript: &str) -> Result<String, ModelError> {
        let mut child = self.spawn(Stdio::piped())?;
        Self::write_transcript(&mut child, transcript).await?;

        let output = timeout(self.call_timeout, child.wait_with_output())
            .await
            .map_err(|_| ModelError::Timeout(self.call_timeout))?
            .map_err(|e| ModelError::Transient(format!("failed to wait for model: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ModelError::Transient(format!(
                "model exited with {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn run_streaming(
        &self,
        transcript: &str,
        history: Arc<Mutex<Vec<Message>>>,
    ) -> Result<TokenStream, ModelError> {
        let mut child = self.spawn(Stdio::null())?;
        Self::write_transcript(&mut child, transcript).await?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ModelError::Transient("model stdout unavailable".to_string()))?;
        let lines = BufReader::new(stdout).lines();

        let state = StreamState {
            lines,
            child,
            reply: String::new(),
            history,
        };

        let stream = futures::stream::unfold(Some(state), |state| async move {
            let mut state = state?;
            match state.lines.next_line().await {
                Ok(Some(line)) => {
                    let token = format!("{}\n", line);
                    state.reply.push_str(&token);
                    Some((Ok(token), Some(state)))
                }
                Ok(None) => {
                    let status = state.child.wait().await;
                    match status {
                        Ok(s) if !s.success() && state.reply.is_empty() => Some((
                            Err(ModelError::Transient(format!(
                                "model exited with {}",
                                s.code().unwrap_or(-1)
                            ))),
                            None,
                        )),
                        _ => {
                            let reply = state.reply.trim_end().to_string();
                            state.history.lock().push(Message::assistant(reply));
                            None
                        }
                    }
                }
                Err(e) => Some((
                    Err(ModelError::Transient(format!("failed to read model output: {}", e))),
                    None,
                )),
            }
        });

        Ok(Box::pin(stream))
    }
}

struct StreamState {
    lines: tokio::io::Lines<BufReader<tokio::process::ChildStdout>>,
    child: Child,
    reply: String,
    history: Arc<Mutex<Vec<Message>>>,
}

/// Render a transcript the local model reads from stdin
pub fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let heading = match message.role {
            Role::System => "### System",
            Role::User => "### User",
            Role::Assistant => "### Assistant",
        };
        out.push_str(heading);
        out.push('\n');
        out.push_str(message.content.trim());
        out.push_str("\n\n");
    }
    out.push_str("### Assistant\n");
    out
}

/// Session over a command model; keeps its own transcript so turns build on
/// each other
pub struct CommandSession {
    spec: Arc<CommandSpec>,
    history: Arc<Mutex<Vec<Message>>>,
}

impl CommandSession {
    fn transcript_with(&self, messages: &[Message]) -> String {
        let mut history = self.history.lock();
        history.extend(messages.iter().cloned());
        render_transcript(&history)
    }
}

#[async_trait]
impl ModelSession for CommandSession {
    async fn prompt(&self, messages: &[Message]) -> Result<String, ModelError> {
        let transcript = self.transcript_with(messages);
        let reply = self.spec.run_to_completion(&transcript).await?;
        self.history
            .lock()
            .push(Message::assistant(reply.trim_end().to_string()));
        Ok(reply)
    }

    async fn prompt_streaming(&self, messages: &[Message]) -> Result<TokenStream, ModelError> {
        let transcript = self.transcript_with(messages);
        self.spec
            .run_streaming(&transcript, Arc::clone(&self.history))
            .await
    }

    fn destroy(&self) -> Result<(), ModelError> {
        self.history.lock().clear();
        Ok(())
    }
}

#[async_trait]
impl LanguageModel for CommandModel {
    fn name(&self) -> &str {
        "command"
    }

    async fn availability(&self) -> Availability {
        let probe = Command::new(&self.spec.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match probe {
            Ok(status) if status.success() => Availability::Available,
            Ok(status) => {
                debug!(program = %self.spec.program, ?status, "Model probe exited unsuccessfully");
                Availability::Unavailable
            }
            Err(e) => {
                debug!(program = %self.spec.program, error = %e, "Model probe failed");
                Availability::Unavailable
            }
        }
    }

    async fn create(&self, options: SessionOptions) -> Result<Box<dyn ModelSession>, ModelError> {
        Ok(Box::new(CommandSession {
            spec: Arc::clone(&self.spec),
            history: Arc::new(Mutex::new(options.initial_prompts)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command() {
        let model = CommandModel::default();
        assert_eq!(model.program(), "ollama");
        assert_eq!(model.name(), "command");
    }

    #[test]
    fn test_from_command_line() {
        let parts = vec!["llamafile".to_string(), "--cli".to_string()];
        let model = CommandModel::from_command_line(&parts).unwrap();
        assert_eq!(model.program(), "llamafile");
        assert_eq!(model.spec.args, vec!["--cli".to_string()]);
        assert!(CommandModel::from_command_line(&[]).is_none());
    }

    #[test]
    fn test_render_transcript() {
        let transcript = render_transcript(&[
            Message::system("You are an analyst."),
            Message::user("What is the main argument?"),
        ]);
        assert_eq!(
            transcript,
            "### System\nYou are an analyst.\n\n### User\nWhat is the main argument?\n\n### Assistant\n"
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let model = CommandModel::new("/nonexistent/smartsight-model", Vec::new());
        assert_eq!(model.availability().await, Availability::Unavailable);
    }
}
