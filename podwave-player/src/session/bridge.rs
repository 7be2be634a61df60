//! Resource event bridge
//!
//! Forwards audio resource notifications into the session: play/pause flags
//! are mirrored into the snapshot, time updates and end-of-stream go out on
//! the event bus. One bridge is attached per resource, when the session
//! creates it.

use std::sync::Weak;

use podwave_common::events::PlayerEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::SessionInner;
use crate::audio::{AudioResource, ResourceEvent};

pub(super) struct EventBridge {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl EventBridge {
    /// Subscribe to `resource` and start forwarding
    pub(super) fn attach(resource: &dyn AudioResource, session: Weak<SessionInner>) -> Self {
        let mut events = resource.subscribe();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            debug!("Event bridge attached");
            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => event,
                };

                match event {
                    Ok(event) => {
                        let Some(session) = session.upgrade() else {
                            break;
                        };
                        session.apply_resource_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Event bridge lagged, skipped {} resource events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Event bridge detached");
        });

        Self { cancel, handle }
    }

    /// Stop forwarding and wait for the task to finish
    pub(super) async fn detach(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!("Event bridge task failed: {}", e);
        }
    }
}

impl SessionInner {
    async fn apply_resource_event(&self, event: ResourceEvent) {
        match event {
            ResourceEvent::Started => self.mirror_playing(true).await,
            ResourceEvent::Paused => self.mirror_playing(false).await,
            ResourceEvent::Ended => {
                self.mirror_playing(false).await;
                let item_id = self.state_tx.borrow().current_item_id;
                self.events.emit_lossy(PlayerEvent::PlaybackEnded {
                    item_id,
                    timestamp: chrono::Utc::now(),
                });
            }
            ResourceEvent::TimeUpdate {
                position_seconds,
                duration_seconds,
            } => {
                let item_id = self.state_tx.borrow().current_item_id;
                self.events.emit_lossy(PlayerEvent::PlaybackProgress {
                    item_id,
                    position_seconds,
                    duration_seconds,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }

    async fn mirror_playing(&self, playing: bool) {
        let mut control = self.control.lock().await;
        control.state.is_playing = playing;
        self.publish(&control.state);
    }
}
