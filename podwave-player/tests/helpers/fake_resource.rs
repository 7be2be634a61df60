//! In-memory audio resource
//!
//! Behaves like a media element: `play()` can be delayed or made to fail, a
//! new source or a pause interrupts a pending play, and the position clamps
//! to the duration.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use podwave_player::audio::{AudioResource, ResourceError, ResourceEvent};
use tokio::sync::{broadcast, watch};

struct FakeState {
    source: Option<String>,
    sources: Vec<String>,
    paused: bool,
    position: f64,
    duration: f64,
    rate: f64,
    play_delay: Duration,
    play_error: Option<ResourceError>,
    play_calls: usize,
}

pub struct FakeResource {
    state: Mutex<FakeState>,
    events: broadcast::Sender<ResourceEvent>,
    requests: watch::Sender<u64>,
    subscriptions: AtomicUsize,
    creations: AtomicUsize,
}

impl FakeResource {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        let (requests, _) = watch::channel(0);
        Self {
            state: Mutex::new(FakeState {
                source: None,
                sources: Vec::new(),
                paused: true,
                position: 0.0,
                duration: 600.0,
                rate: 1.0,
                play_delay: Duration::ZERO,
                play_error: None,
                play_calls: 0,
            }),
            events,
            requests,
            subscriptions: AtomicUsize::new(0),
            creations: AtomicUsize::new(0),
        }
    }

    pub fn set_play_delay(&self, delay: Duration) {
        self.state.lock().unwrap().play_delay = delay;
    }

    /// Make every following `play()` fail with `error`
    pub fn fail_play_with(&self, error: ResourceError) {
        self.state.lock().unwrap().play_error = Some(error);
    }

    pub fn clear_play_failure(&self) {
        self.state.lock().unwrap().play_error = None;
    }

    /// Emit a notification as if the output did it
    pub fn emit(&self, event: ResourceEvent) {
        if matches!(event, ResourceEvent::Paused | ResourceEvent::Ended) {
            self.state.lock().unwrap().paused = true;
        }
        if event == ResourceEvent::Started {
            self.state.lock().unwrap().paused = false;
        }
        let _ = self.events.send(event);
    }

    pub fn current_source(&self) -> Option<String> {
        self.state.lock().unwrap().source.clone()
    }

    /// Every source ever set, in order
    pub fn sources(&self) -> Vec<String> {
        self.state.lock().unwrap().sources.clone()
    }

    pub fn rate(&self) -> f64 {
        self.state.lock().unwrap().rate
    }

    pub fn play_calls(&self) -> usize {
        self.state.lock().unwrap().play_calls
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Live receivers on the notification channel
    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn record_creation(&self) {
        self.creations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn creation_count(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    fn interrupt(&self) {
        self.requests.send_modify(|n| *n += 1);
    }
}

#[async_trait]
impl AudioResource for FakeResource {
    fn set_source(&self, url: &str) {
        self.interrupt();
        let mut state = self.state.lock().unwrap();
        state.source = Some(url.to_string());
        state.sources.push(url.to_string());
        state.position = 0.0;
        state.paused = true;
    }

    async fn play(&self) -> Result<(), ResourceError> {
        let mut requests = self.requests.subscribe();
        let request = *requests.borrow_and_update();

        let (delay, error) = {
            let mut state = self.state.lock().unwrap();
            state.play_calls += 1;
            if state.source.is_none() {
                return Err(ResourceError::NoSource);
            }
            (state.play_delay, state.play_error.clone())
        };

        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = requests.changed() => return Err(ResourceError::Interrupted),
            }
        }
        if *self.requests.borrow() != request {
            return Err(ResourceError::Interrupted);
        }
        if let Some(error) = error {
            return Err(error);
        }

        let was_paused = {
            let mut state = self.state.lock().unwrap();
            std::mem::replace(&mut state.paused, false)
        };
        if was_paused {
            let _ = self.events.send(ResourceEvent::Started);
        }
        Ok(())
    }

    fn pause(&self) {
        self.interrupt();
        let was_playing = {
            let mut state = self.state.lock().unwrap();
            !std::mem::replace(&mut state.paused, true)
        };
        if was_playing {
            let _ = self.events.send(ResourceEvent::Paused);
        }
    }

    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    fn set_position(&self, seconds: f64) {
        let mut state = self.state.lock().unwrap();
        state.position = seconds.clamp(0.0, state.duration);
    }

    fn position(&self) -> f64 {
        self.state.lock().unwrap().position
    }

    fn duration(&self) -> Option<f64> {
        Some(self.state.lock().unwrap().duration)
    }

    fn set_rate(&self, rate: f64) {
        self.state.lock().unwrap().rate = rate;
    }

    fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.events.subscribe()
    }
}
