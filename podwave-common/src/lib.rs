//! # Podwave Common Library
//!
//! Shared code for the Podwave services including:
//! - Narration domain types (ItemId, NarrationItem, listing filters)
//! - Event types (PlayerEvent enum) and the EventBus
//! - Configuration loading and resolution
//! - Human-readable time formatting
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod narration;
pub mod sse;

pub use error::{Error, Result};
pub use narration::{ItemId, NarrationItem, NarrationStatus};
