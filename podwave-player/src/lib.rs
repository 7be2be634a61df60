//! # Podwave Narration Player (podwave-player)
//!
//! Plays generated narrations from the narration API through the local audio
//! device and exposes playback control over HTTP/SSE.
//!
//! **Architecture:** one long-lived [`PlaybackSession`] owns a single audio
//! resource (symphonia + rubato + cpal) and publishes state snapshots;
//! axum handlers call into the session and stream its events.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod source;

pub use error::{Error, Result};
pub use session::PlaybackSession;
