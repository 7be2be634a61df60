//! Playback session
//!
//! The single owner of playback state. Every surface (HTTP handlers, SSE
//! streams) talks to one long-lived [`PlaybackSession`] handle; only the
//! session touches the audio resource.
//!
//! Each `play_item` call captures a generation number when it starts and
//! re-checks it after every suspension point (metadata fetch, resource
//! `play()`). `play_item` and `close_session` bump the generation, so results
//! from a superseded request are dropped instead of overwriting newer state.

mod bridge;
pub mod rate;

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use podwave_common::events::{
    EventBus, PlaybackError, PlaybackPosition, PlaybackState, PlayerEvent, SessionErrorKind,
    DEFAULT_PLAYBACK_RATE,
};
use podwave_common::ItemId;
use tokio::sync::{watch, Mutex, OnceCell};
use tracing::{debug, error, info, warn};

use crate::audio::{AudioResource, ResourceError, ResourceFactory};
use crate::error::Result;
use crate::source::NarrationSource;
use bridge::EventBridge;

pub use rate::{next_rate, validate_rate, RATE_CYCLE};

/// Mutable session state, guarded as one unit
struct Control {
    state: PlaybackState,
    generation: u64,
}

struct SessionInner {
    source: Arc<dyn NarrationSource>,
    factory: ResourceFactory,
    resource: OnceCell<Arc<dyn AudioResource>>,
    bridge: StdMutex<Option<EventBridge>>,
    control: Mutex<Control>,
    state_tx: watch::Sender<PlaybackState>,
    events: Arc<EventBus>,
}

impl SessionInner {
    /// Push a snapshot to watchers and the event bus if it changed
    fn publish(&self, state: &PlaybackState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if current == state {
                false
            } else {
                *current = state.clone();
                true
            }
        });
        if changed {
            self.events.emit_lossy(PlayerEvent::state(state.clone()));
        }
    }
}

/// Cloneable handle to the playback session
#[derive(Clone)]
pub struct PlaybackSession {
    inner: Arc<SessionInner>,
}

impl PlaybackSession {
    /// Create a session. The audio resource is created by `factory` on the
    /// first play request, not here.
    pub fn new(
        source: Arc<dyn NarrationSource>,
        factory: ResourceFactory,
        events: Arc<EventBus>,
        default_rate: f64,
    ) -> Self {
        let state = PlaybackState {
            playback_rate: validate_rate(default_rate).unwrap_or(DEFAULT_PLAYBACK_RATE),
            ..Default::default()
        };
        let (state_tx, _) = watch::channel(state.clone());

        Self {
            inner: Arc::new(SessionInner {
                source,
                factory,
                resource: OnceCell::new(),
                bridge: StdMutex::new(None),
                control: Mutex::new(Control {
                    state,
                    generation: 0,
                }),
                state_tx,
                events,
            }),
        }
    }

    /// The resource, created (and bridged) on first use
    async fn resource(&self) -> std::result::Result<Arc<dyn AudioResource>, ResourceError> {
        let resource = self
            .inner
            .resource
            .get_or_try_init(|| async {
                let resource = (self.inner.factory)()?;
                let bridge = EventBridge::attach(resource.as_ref(), Arc::downgrade(&self.inner));
                *self.inner.bridge.lock().unwrap_or_else(PoisonError::into_inner) = Some(bridge);
                info!("Audio resource created");
                Ok::<_, ResourceError>(resource)
            })
            .await?;
        Ok(Arc::clone(resource))
    }

    /// The resource if one has been created
    fn existing_resource(&self) -> Option<Arc<dyn AudioResource>> {
        self.inner.resource.get().cloned()
    }

    /// Play a narration by id.
    ///
    /// Replaying the current narration resumes it without refetching. Fetch
    /// and attach failures are recorded in the snapshot, never returned.
    pub async fn play_item(&self, id: ItemId) -> PlaybackState {
        let generation = {
            let mut control = self.inner.control.lock().await;
            if control.state.current_item_id == Some(id) && control.state.current_item.is_some() {
                // a load of another item may still be in flight; it loses
                if control.state.is_loading {
                    control.generation += 1;
                    control.state.is_loading = false;
                    self.inner.publish(&control.state);
                    debug!(item_id = %id, "Replay of current item supersedes pending load");
                }
                let generation = control.generation;
                drop(control);
                return self.resume_current(generation).await;
            }

            control.generation += 1;
            control.state.is_loading = true;
            control.state.last_error = None;
            self.inner.publish(&control.state);
            control.generation
        };
        info!(item_id = %id, generation, "Play requested");

        let item = match self.inner.source.fetch_status(&id).await {
            Ok(item) => item,
            Err(e) => {
                let kind = SessionErrorKind::FetchFailed;
                self.fail(generation, id, kind, e.kind_name(), e.to_string()).await;
                return self.snapshot();
            }
        };

        let resource = match self.resource().await {
            Ok(resource) => resource,
            Err(e) => {
                let kind = SessionErrorKind::AttachFailed;
                self.fail(generation, id, kind, e.kind_name(), e.to_string()).await;
                return self.snapshot();
            }
        };

        {
            let mut control = self.inner.control.lock().await;
            if control.generation != generation {
                debug!(item_id = %id, "Discarding superseded fetch result");
                return control.state.clone();
            }
            if !item.is_playable() {
                debug!(
                    item_id = %id,
                    status = %item.status,
                    "Playing narration that is not marked done"
                );
            }
            control.state.current_item_id = Some(id);
            control.state.current_item = Some(item);
            resource.set_source(&self.inner.source.streaming_url(&id));
            resource.set_rate(control.state.playback_rate);
            self.inner.publish(&control.state);
        }

        let result = resource.play().await;

        let mut control = self.inner.control.lock().await;
        if control.generation != generation {
            debug!(item_id = %id, "Discarding superseded play result");
            return control.state.clone();
        }
        match result {
            Ok(()) => {
                control.state.is_loading = false;
                control.state.is_playing = !resource.is_paused();
                self.inner.publish(&control.state);
                info!(item_id = %id, "Playback started");
            }
            Err(e) if e.is_interrupted() => {
                let kind = SessionErrorKind::InterruptedLoad;
                debug!(item_id = %id, kind = %kind, "Load interrupted");
            }
            Err(e) => {
                let kind = SessionErrorKind::AttachFailed;
                self.record_failure(&mut control, id, kind, e.kind_name(), e.to_string());
                resource.pause();
            }
        }
        control.state.clone()
    }

    /// Resume the current narration if it is paused
    async fn resume_current(&self, generation: u64) -> PlaybackState {
        let Some(resource) = self.existing_resource() else {
            return self.snapshot();
        };
        if resource.is_paused() {
            self.resume(&resource, generation).await;
        }
        self.snapshot()
    }

    async fn resume(&self, resource: &Arc<dyn AudioResource>, generation: u64) {
        match resource.play().await {
            Ok(()) => {
                let mut control = self.inner.control.lock().await;
                if control.generation == generation {
                    control.state.is_playing = !resource.is_paused();
                    self.inner.publish(&control.state);
                }
            }
            Err(e) if e.is_interrupted() => {
                debug!(kind = %SessionErrorKind::InterruptedLoad, "Resume interrupted");
            }
            Err(e) => {
                let kind = SessionErrorKind::PlaybackResumeFailed;
                warn!(kind = %kind, "Failed to resume playback: {}", e);
            }
        }
    }

    /// Record a failure for `generation` if it is still current
    async fn fail(
        &self,
        generation: u64,
        id: ItemId,
        kind: SessionErrorKind,
        reason: &str,
        message: String,
    ) {
        let mut control = self.inner.control.lock().await;
        if control.generation != generation {
            debug!(item_id = %id, "Discarding failure of superseded request: {}", message);
            return;
        }
        self.record_failure(&mut control, id, kind, reason, message);
        if let Some(resource) = self.existing_resource() {
            resource.pause();
        }
    }

    fn record_failure(
        &self,
        control: &mut Control,
        id: ItemId,
        kind: SessionErrorKind,
        reason: &str,
        message: String,
    ) {
        error!(item_id = %id, kind = %kind, reason, "{}", message);
        let err = PlaybackError::new(kind, reason, message);

        control.state.current_item_id = None;
        control.state.current_item = None;
        control.state.is_playing = false;
        control.state.is_loading = false;
        control.state.last_error = Some(err.clone());
        self.inner.publish(&control.state);

        self.inner.events.emit_lossy(PlayerEvent::PlaybackError {
            item_id: id,
            error: err,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Pause if playing, otherwise resume. No-op when nothing is loaded.
    pub async fn toggle_playback(&self) -> PlaybackState {
        let Some(resource) = self.existing_resource() else {
            return self.snapshot();
        };

        let generation = {
            let mut control = self.inner.control.lock().await;
            if control.state.current_item.is_none() {
                return control.state.clone();
            }
            if !resource.is_paused() {
                resource.pause();
                control.state.is_playing = false;
                self.inner.publish(&control.state);
                return control.state.clone();
            }
            control.generation
        };

        self.resume(&resource, generation).await;
        self.snapshot()
    }

    /// Move the playhead. Play/pause state is unchanged.
    pub async fn seek(&self, seconds: f64) -> PlaybackPosition {
        if let Some(resource) = self.existing_resource() {
            let _control = self.inner.control.lock().await;
            resource.set_position(seconds);
            debug!("Seek to {:.2}s", resource.position());
        }
        self.position()
    }

    /// Set the session rate, applying it to the live resource
    pub async fn set_playback_rate(&self, rate: f64) -> Result<PlaybackState> {
        let rate = validate_rate(rate)?;
        let mut control = self.inner.control.lock().await;
        control.state.playback_rate = rate;
        if let Some(resource) = self.existing_resource() {
            resource.set_rate(rate);
        }
        self.inner.publish(&control.state);
        debug!("Playback rate set to {}", rate);
        Ok(control.state.clone())
    }

    /// Advance to the next rate in [`RATE_CYCLE`]
    pub async fn cycle_playback_rate(&self) -> Result<PlaybackState> {
        let current = self.inner.control.lock().await.state.playback_rate;
        self.set_playback_rate(next_rate(current)).await
    }

    /// Stop playback and forget the current narration
    ///
    /// Invalidates any in-flight play request. The resource and the rate are
    /// kept.
    pub async fn close_session(&self) -> PlaybackState {
        let mut control = self.inner.control.lock().await;
        control.generation += 1;
        if let Some(resource) = self.existing_resource() {
            resource.pause();
            resource.set_position(0.0);
        }
        control.state.current_item_id = None;
        control.state.current_item = None;
        control.state.is_playing = false;
        control.state.is_loading = false;
        self.inner.publish(&control.state);
        info!("Session closed");
        control.state.clone()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> PlaybackState {
        self.inner.state_tx.borrow().clone()
    }

    /// Watch snapshots as they change
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.inner.state_tx.subscribe()
    }

    /// Event bus carrying snapshots, progress and errors
    pub fn events(&self) -> &Arc<EventBus> {
        &self.inner.events
    }

    /// Position and duration as the resource reports them
    pub fn position(&self) -> PlaybackPosition {
        match self.existing_resource() {
            Some(resource) => PlaybackPosition {
                position_seconds: resource.position(),
                duration_seconds: resource.duration(),
                is_playing: !resource.is_paused(),
            },
            None => PlaybackPosition {
                position_seconds: 0.0,
                duration_seconds: None,
                is_playing: false,
            },
        }
    }

    /// Pause output and detach the event bridge
    pub async fn shutdown(&self) {
        if let Some(resource) = self.existing_resource() {
            resource.pause();
        }
        let bridge = self
            .inner
            .bridge
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(bridge) = bridge {
            bridge.detach().await;
        }
        info!("Playback session shut down");
    }
}
