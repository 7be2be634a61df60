//! Playback-related type definitions
//!
//! The observable playback snapshot and its supporting types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::narration::{ItemId, NarrationItem};

/// Default playback rate for a fresh session
pub const DEFAULT_PLAYBACK_RATE: f64 = 1.0;

/// Error classification for playback session failures
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum SessionErrorKind {
    /// Metadata retrieval failed (network or unknown item)
    FetchFailed,
    /// The audio resource could not load or start the stream
    AttachFailed,
    /// Load superseded by a newer request; never shown to users
    InterruptedLoad,
    /// Resume rejected by the audio resource; logged only
    PlaybackResumeFailed,
}

impl fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionErrorKind::FetchFailed => write!(f, "FetchFailed"),
            SessionErrorKind::AttachFailed => write!(f, "AttachFailed"),
            SessionErrorKind::InterruptedLoad => write!(f, "InterruptedLoad"),
            SessionErrorKind::PlaybackResumeFailed => write!(f, "PlaybackResumeFailed"),
        }
    }
}

/// Error descriptor stored in `PlaybackState::last_error`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackError {
    pub kind: SessionErrorKind,
    /// Short machine-readable cause, e.g. `NotFound` or `Transient`
    pub reason: String,
    /// Human-readable detail
    pub message: String,
}

impl PlaybackError {
    pub fn new(
        kind: SessionErrorKind,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            reason: reason.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind, self.reason, self.message)
    }
}

/// Observable playback state
///
/// Position and duration are deliberately absent: the audio resource owns
/// them and surfaces read them on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_item_id: Option<ItemId>,
    pub current_item: Option<NarrationItem>,
    pub is_playing: bool,
    pub is_loading: bool,
    pub last_error: Option<PlaybackError>,
    pub playback_rate: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_item_id: None,
            current_item: None,
            is_playing: false,
            is_loading: false,
            last_error: None,
            playback_rate: DEFAULT_PLAYBACK_RATE,
        }
    }
}

impl PlaybackState {
    /// Derive the session phase from the snapshot
    pub fn phase(&self) -> SessionPhase {
        if self.is_loading {
            SessionPhase::Loading
        } else if self.current_item.is_some() {
            if self.is_playing {
                SessionPhase::ReadyPlaying
            } else {
                SessionPhase::ReadyPaused
            }
        } else if self.last_error.is_some() {
            SessionPhase::IdleWithError
        } else {
            SessionPhase::Idle
        }
    }
}

/// Session phase as seen by presentation surfaces
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Loading,
    ReadyPlaying,
    ReadyPaused,
    IdleWithError,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Loading => write!(f, "loading"),
            SessionPhase::ReadyPlaying => write!(f, "playing"),
            SessionPhase::ReadyPaused => write!(f, "paused"),
            SessionPhase::IdleWithError => write!(f, "error"),
        }
    }
}

/// Position readout taken from the audio resource
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackPosition {
    pub position_seconds: f64,
    pub duration_seconds: Option<f64>,
    pub is_playing: bool,
}
