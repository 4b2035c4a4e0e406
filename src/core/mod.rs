//! Core orchestration logic.
//!
//! This module contains:
//! - Gateway: Scoped model sessions with creation retries
//! - Cache: Per-page response slots
//! - Gate: Page eligibility and the domain whitelist
//! - Companion: The controller driving a page session

pub mod cache;
pub mod companion;
pub mod gate;
pub mod gateway;
pub mod retry;

// Re-export commonly used types
pub use cache::{CacheEntry, ResponseCache, SlotTicket};
pub use companion::Companion;
pub use gate::{Activation, Decision, Rejection, WhitelistStore};
pub use gateway::{ModelGateway, SessionGuard};
pub use retry::RetryPolicy;
