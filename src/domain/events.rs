//! Job lifecycle events.
//!
//! Every analysis job records what happened to it in an in-memory,
//! append-only log kept for the lifetime of the page session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::JobKind;

/// A single job event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The job this event belongs to
    pub kind: JobKind,

    /// Type of event
    pub event_type: JobEventType,

    /// Human-readable summary (no article text)
    pub summary: String,

    /// Time taken in milliseconds (for finished jobs)
    pub duration_ms: Option<u64>,

    /// Error message if failed
    pub error: Option<String>,
}

impl JobEvent {
    /// Create a new event with the current timestamp
    pub fn new(kind: JobKind, event_type: JobEventType, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            event_type,
            summary: summary.into(),
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Types of job events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEventType {
    /// The job started calling the model
    Started,

    /// A cached artifact was re-rendered
    CacheHit,

    /// Activation ignored because the job is still running
    AlreadyRunning,

    /// A model call or session creation is being retried
    Retrying,

    /// The job finished and rendered its result
    Completed,

    /// The job failed and rendered an error card
    Failed,
}

impl std::fmt::Display for JobEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobEventType::Started => "started",
            JobEventType::CacheHit => "cache_hit",
            JobEventType::AlreadyRunning => "already_running",
            JobEventType::Retrying => "retrying",
            JobEventType::Completed => "completed",
            JobEventType::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Shared append-only event log
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<JobEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, event: JobEvent) {
        self.events.lock().push(event);
    }

    /// Snapshot of every event so far
    pub fn events(&self) -> Vec<JobEvent> {
        self.events.lock().clone()
    }

    /// Events of one job kind
    pub fn for_kind(&self, kind: JobKind) -> Vec<JobEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of events of a given kind and type
    pub fn count(&self, kind: JobKind, event_type: JobEventType) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind && e.event_type == event_type)
            .count()
    }
}
