//! Server-Sent Events stream
//!
//! Each client first receives the current snapshot, then every event bus
//! event as it happens.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use podwave_common::events::PlayerEvent;
use podwave_common::sse::{event_stream as to_sse_stream, keep_alive};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use super::server::AppContext;

/// GET /events
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    // subscribe before reading the snapshot so nothing falls in between
    let rx = ctx.session.events().subscribe();
    let initial = PlayerEvent::state(ctx.session.snapshot());

    let live = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("SSE client lagging: {}", e);
                None
            }
        }
    });

    let events = stream::once(async move { initial }).chain(live);
    Sse::new(to_sse_stream(events)).keep_alive(keep_alive())
}
