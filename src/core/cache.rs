//! Per-page response cache.
//!
//! One slot per cached job kind. A slot is absent, in progress, or holds a
//! completed artifact. Completed slots are never overwritten.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{Artifact, CacheSlot};

#[derive(Debug, Clone)]
enum SlotState {
    InProgress,
    Completed(Artifact),
}

/// Outcome of starting a cached job
#[derive(Debug)]
pub enum CacheEntry {
    /// The artifact is already available; re-render it
    Cached(Artifact),
    /// Another activation is still running; do nothing
    AlreadyRunning,
    /// The slot is now in progress; run the job and complete the ticket
    Started(SlotTicket),
}

/// Process-local cache of completed analyses
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    slots: Arc<Mutex<HashMap<CacheSlot, SlotState>>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start work for a slot
    pub fn begin(&self, slot: CacheSlot) -> CacheEntry {
        let mut slots = self.slots.lock();
        match slots.get(&slot) {
            Some(SlotState::Completed(artifact)) => CacheEntry::Cached(artifact.clone()),
            Some(SlotState::InProgress) => CacheEntry::AlreadyRunning,
            None => {
                slots.insert(slot, SlotState::InProgress);
                CacheEntry::Started(SlotTicket {
                    slot,
                    slots: Arc::clone(&self.slots),
                    finished: false,
                })
            }
        }
    }

    /// Completed artifact of a slot, if any
    pub fn get(&self, slot: CacheSlot) -> Option<Artifact> {
        match self.slots.lock().get(&slot) {
            Some(SlotState::Completed(artifact)) => Some(artifact.clone()),
            _ => None,
        }
    }

    /// Whether a job for the slot is in flight
    pub fn is_running(&self, slot: CacheSlot) -> bool {
        matches!(self.slots.lock().get(&slot), Some(SlotState::InProgress))
    }
}

/// Marks a slot as in progress until completed or dropped
#[derive(Debug)]
pub struct SlotTicket {
    slot: CacheSlot,
    slots: Arc<Mutex<HashMap<CacheSlot, SlotState>>>,
    finished: bool,
}

impl SlotTicket {
    pub fn slot(&self) -> CacheSlot {
        self.slot
    }

    /// Store the artifact and close the slot
    pub fn complete(mut self, artifact: Artifact) {
        debug_assert_eq!(artifact.slot(), self.slot);
        self.slots
            .lock()
            .insert(self.slot, SlotState::Completed(artifact));
        self.finished = true;
    }
}

impl Drop for SlotTicket {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut slots = self.slots.lock();
        if matches!(slots.get(&self.slot), Some(SlotState::InProgress)) {
            slots.remove(&self.slot);
        }
    }
}
