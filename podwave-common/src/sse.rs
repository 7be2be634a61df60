//! Server-Sent Events (SSE) utilities
//!
//! Conversion of player events into SSE frames, shared by every service that
//! streams playback state.

use axum::response::sse::{Event, KeepAlive};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tracing::warn;

use crate::events::PlayerEvent;

/// Keep-alive interval for SSE connections
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Convert a player event into an SSE frame
///
/// The event's type tag becomes the SSE `event:` field and the JSON body the
/// `data:` field. Returns None if serialization fails (logged).
pub fn to_sse_event(event: &PlayerEvent) -> Option<Event> {
    match Event::default().event(event.event_type()).json_data(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("Failed to serialize {} event: {}", event.event_type(), e);
            None
        }
    }
}

/// Turn a stream of player events into an SSE body stream
pub fn event_stream<S>(events: S) -> impl Stream<Item = Result<Event, Infallible>>
where
    S: Stream<Item = PlayerEvent>,
{
    events.filter_map(|event| async move { to_sse_event(&event).map(Ok) })
}

/// Keep-alive configuration shared by all SSE endpoints
pub fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("keep-alive")
}
