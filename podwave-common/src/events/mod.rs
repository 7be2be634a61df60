//! Event types for the Podwave event system
//!
//! Provides the shared event definitions and the EventBus used to fan
//! playback changes out to every connected presentation surface.

mod playback_types;

pub use playback_types::{
    PlaybackError, PlaybackPosition, PlaybackState, SessionErrorKind, SessionPhase,
    DEFAULT_PLAYBACK_RATE,
};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::narration::ItemId;

/// Player event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
/// The `type` tag doubles as the SSE event name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Playback snapshot changed
    ///
    /// Emitted after every session mutation (control operation or mirrored
    /// resource event). Carries the full snapshot so late subscribers never
    /// need to reconcile deltas.
    PlaybackState {
        state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback progress update
    ///
    /// Emitted from the audio resource's time updates. Not stored by the
    /// session; the resource is the source of truth for position.
    PlaybackProgress {
        item_id: Option<ItemId>,
        position_seconds: f64,
        duration_seconds: Option<f64>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current narration played to its end
    PlaybackEnded {
        item_id: Option<ItemId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A play request failed and the failure was recorded in the snapshot
    PlaybackError {
        item_id: ItemId,
        error: PlaybackError,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::PlaybackState { .. } => "PlaybackState",
            PlayerEvent::PlaybackProgress { .. } => "PlaybackProgress",
            PlayerEvent::PlaybackEnded { .. } => "PlaybackEnded",
            PlayerEvent::PlaybackError { .. } => "PlaybackError",
        }
    }

    /// Snapshot event stamped with the current time
    pub fn state(state: PlaybackState) -> Self {
        PlayerEvent::PlaybackState {
            state,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Central event distribution
///
/// Thin wrapper over `tokio::sync::broadcast`: one sender, any number of
/// subscribers. Slow subscribers lag and drop old events rather than
/// blocking emitters.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use podwave_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// ```
    /// use podwave_common::events::{EventBus, PlayerEvent};
    ///
    /// let event_bus = EventBus::new(16);
    /// event_bus.emit_lossy(PlayerEvent::PlaybackEnded {
    ///     item_id: None,
    ///     timestamp: chrono::Utc::now(),
    /// });
    /// ```
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
