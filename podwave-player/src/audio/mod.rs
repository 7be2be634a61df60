//! Audio resource abstraction and the device-backed implementation
//!
//! The session drives a single [`AudioResource`]: point it at a stream URL,
//! play, pause, seek, and change rate. The resource reports what actually
//! happened through [`ResourceEvent`]s so the session can mirror real
//! playback state instead of assuming it.

pub mod decoder;
pub mod device;
pub mod output;
pub mod resampler;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

pub use decoder::{DecodedAudio, StreamDecoder};
pub use device::DeviceResource;
pub use output::AudioOutput;
pub use resampler::Resampler;

/// Notifications emitted by an audio resource
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    /// Audio started (or resumed) flowing to the output
    Started,
    /// Output stopped before the end of the stream
    Paused,
    /// The stream played through to its end
    Ended,
    /// Periodic position report while playing
    TimeUpdate {
        position_seconds: f64,
        duration_seconds: Option<f64>,
    },
}

/// Audio resource failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The pending play was superseded by a new source or a pause
    #[error("Play request interrupted")]
    Interrupted,

    /// `play()` called before any source was set
    #[error("No source set")]
    NoSource,

    /// The stream could not be fetched
    #[error("Failed to load stream: {0}")]
    Load(String),

    /// The stream was fetched but is not decodable audio
    #[error("Failed to decode stream: {0}")]
    Decode(String),

    /// The output device failed
    #[error("Audio output error: {0}")]
    Output(String),

    /// The platform refused to start playback
    #[error("Playback not allowed: {0}")]
    NotAllowed(String),
}

impl ResourceError {
    /// Benign failure caused by a newer request rather than by the stream
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ResourceError::Interrupted)
    }

    /// Variant name, used as the reason on recorded playback errors
    pub fn kind_name(&self) -> &'static str {
        match self {
            ResourceError::Interrupted => "Interrupted",
            ResourceError::NoSource => "NoSource",
            ResourceError::Load(_) => "Load",
            ResourceError::Decode(_) => "Decode",
            ResourceError::Output(_) => "Output",
            ResourceError::NotAllowed(_) => "NotAllowed",
        }
    }
}

/// A single playable audio element
///
/// Implementations must be cheap to call from async code: every method except
/// `play()` returns immediately.
#[async_trait]
pub trait AudioResource: Send + Sync + 'static {
    /// Point the resource at a new stream
    ///
    /// Stops current output and fails any pending `play()` with
    /// [`ResourceError::Interrupted`].
    fn set_source(&self, url: &str);

    /// Start or resume playback, loading the source first if needed
    ///
    /// Resolves once audio is flowing, or with the reason it could not start.
    async fn play(&self) -> Result<(), ResourceError>;

    /// Stop output, keeping the position
    ///
    /// Fails any pending `play()` with [`ResourceError::Interrupted`].
    fn pause(&self);

    fn is_paused(&self) -> bool;

    /// Move the playhead; clamped to `[0, duration]`
    fn set_position(&self, seconds: f64);

    fn position(&self) -> f64;

    /// Stream duration, once known
    fn duration(&self) -> Option<f64>;

    fn set_rate(&self, rate: f64);

    /// Subscribe to resource notifications
    fn subscribe(&self) -> broadcast::Receiver<ResourceEvent>;
}

/// Creates the session's resource on first use
pub type ResourceFactory =
    Box<dyn Fn() -> Result<Arc<dyn AudioResource>, ResourceError> + Send + Sync>;
