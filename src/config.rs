//! Configuration for smartsight.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SMARTSIGHT_HOME, SMARTSIGHT_MODEL)
//! 2. Config file (.smartsight/config.yaml)
//! 3. Defaults (~/.smartsight, `ollama run llama3.2`)
//!
//! Config file discovery:
//! - Searches current directory and parents for .smartsight/config.yaml
//! - `paths.home` is relative to the .smartsight/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::command::DEFAULT_COMMAND;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub model: Option<ModelConfig>,
    #[serde(default)]
    pub tuning: Option<Tuning>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to the .smartsight/ directory)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Program and arguments of the local model CLI
    pub command: Option<Vec<String>>,
    /// Timeout for one-shot model calls
    pub timeout_seconds: Option<u64>,
}

/// Timing and size constants of the analysis pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tuning {
    /// Delay between overlay injection and the background jobs (default: 1000)
    #[serde(default = "default_mount_delay")]
    pub mount_delay_ms: u64,

    /// Session creation attempts before giving up (default: 5)
    #[serde(default = "default_session_attempts")]
    pub session_attempts: u32,

    /// Linear backoff unit between session attempts (default: 1000)
    #[serde(default = "default_session_backoff")]
    pub session_backoff_ms: u64,

    /// Paragraphs scored per emotion chunk (default: 3)
    #[serde(default = "default_emotion_chunk_size")]
    pub emotion_chunk_size: usize,

    /// Pause between emotion chunks (default: 200)
    #[serde(default = "default_emotion_chunk_pause")]
    pub emotion_chunk_pause_ms: u64,

    /// Scoring attempts per paragraph (default: 3)
    #[serde(default = "default_emotion_attempts")]
    pub emotion_attempts: u32,

    /// Linear backoff unit between scoring attempts (default: 500)
    #[serde(default = "default_emotion_backoff")]
    pub emotion_backoff_ms: u64,

    /// Characters of each paragraph sent for scoring (default: 250)
    #[serde(default = "default_emotion_excerpt")]
    pub emotion_excerpt_chars: usize,

    /// Article characters sent to the bias analyzer (default: 3000)
    #[serde(default = "default_article_chars")]
    pub bias_input_chars: usize,

    /// Labelled article characters sent to the deep analyzer (default: 3500)
    #[serde(default = "default_deep_chars")]
    pub deep_input_chars: usize,

    /// Article characters sent to the quiz generator (default: 3000)
    #[serde(default = "default_article_chars")]
    pub quiz_input_chars: usize,

    /// Article characters sent to the advanced analyzer (default: 3000)
    #[serde(default = "default_article_chars")]
    pub advanced_input_chars: usize,

    /// Article characters embedded in the chat preamble (default: 2000)
    #[serde(default = "default_chat_chars")]
    pub chat_input_chars: usize,

    /// Hold time of a reference highlight (default: 4000)
    #[serde(default = "default_highlight_hold")]
    pub highlight_hold_ms: u64,

    /// Fade-out time of a reference highlight (default: 800)
    #[serde(default = "default_highlight_fade")]
    pub highlight_fade_ms: u64,

    /// Donut sweep animation length (default: 1500)
    #[serde(default = "default_chart_animation")]
    pub chart_animation_ms: u64,
}

fn default_mount_delay() -> u64 {
    1000
}
fn default_session_attempts() -> u32 {
    5
}
fn default_session_backoff() -> u64 {
    1000
}
fn default_emotion_chunk_size() -> usize {
    3
}
fn default_emotion_chunk_pause() -> u64 {
    200
}
fn default_emotion_attempts() -> u32 {
    3
}
fn default_emotion_backoff() -> u64 {
    500
}
fn default_emotion_excerpt() -> usize {
    250
}
fn default_article_chars() -> usize {
    3000
}
fn default_deep_chars() -> usize {
    3500
}
fn default_chat_chars() -> usize {
    2000
}
fn default_highlight_hold() -> u64 {
    4000
}
fn default_highlight_fade() -> u64 {
    800
}
fn default_chart_animation() -> u64 {
    1500
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            mount_delay_ms: default_mount_delay(),
            session_attempts: default_session_attempts(),
            session_backoff_ms: default_session_backoff(),
            emotion_chunk_size: default_emotion_chunk_size(),
            emotion_chunk_pause_ms: default_emotion_chunk_pause(),
            emotion_attempts: default_emotion_attempts(),
            emotion_backoff_ms: default_emotion_backoff(),
            emotion_excerpt_chars: default_emotion_excerpt(),
            bias_input_chars: default_article_chars(),
            deep_input_chars: default_deep_chars(),
            quiz_input_chars: default_article_chars(),
            advanced_input_chars: default_article_chars(),
            chat_input_chars: default_chat_chars(),
            highlight_hold_ms: default_highlight_hold(),
            highlight_fade_ms: default_highlight_fade(),
            chart_animation_ms: default_chart_animation(),
        }
    }
}

impl Tuning {
    pub fn mount_delay(&self) -> Duration {
        Duration::from_millis(self.mount_delay_ms)
    }

    pub fn chart_animation(&self) -> Duration {
        Duration::from_millis(self.chart_animation_ms)
    }

    /// Chunk size, never zero
    pub fn chunk_size(&self) -> usize {
        self.emotion_chunk_size.max(1)
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to smartsight home (whitelist store)
    pub home: PathBuf,
    /// Local model command line
    pub model_command: Vec<String>,
    /// Timeout for one-shot model calls
    pub model_timeout: Duration,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Pipeline tuning
    pub tuning: Tuning,
}

impl ResolvedConfig {
    /// Path of the persisted whitelist
    pub fn whitelist_path(&self) -> PathBuf {
        self.home.join("domains.json")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".smartsight").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Split a `SMARTSIGHT_MODEL` value into program and arguments
fn split_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

fn default_command() -> Vec<String> {
    DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect()
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".smartsight");

    let config_file = find_config_file();
    let parsed = match config_file {
        Some(ref path) => Some(load_config_file(path)?),
        None => None,
    };

    let home = if let Ok(env_home) = std::env::var("SMARTSIGHT_HOME") {
        PathBuf::from(env_home)
    } else if let (Some(path), Some(home)) = (
        config_file.as_ref(),
        parsed.as_ref().and_then(|c| c.paths.home.as_ref()),
    ) {
        let dir = path.parent().unwrap_or(Path::new("."));
        resolve_path(dir, home)
    } else {
        default_home
    };

    let model = parsed.as_ref().and_then(|c| c.model.clone());

    let model_command = match std::env::var("SMARTSIGHT_MODEL") {
        Ok(value) if !value.trim().is_empty() => split_command(&value),
        _ => model
            .as_ref()
            .and_then(|m| m.command.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(default_command),
    };

    let model_timeout = Duration::from_secs(
        model
            .as_ref()
            .and_then(|m| m.timeout_seconds)
            .unwrap_or(120),
    );

    let tuning = parsed.and_then(|c| c.tuning).unwrap_or_default();

    Ok(ResolvedConfig {
        home,
        model_command,
        model_timeout,
        config_file,
        tuning,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
