//! Device-backed audio resource
//!
//! Downloads the narration stream, decodes and resamples it to the device
//! rate, then plays it through a cpal stream owned by a dedicated output
//! thread. Playback rate scales the read cursor.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use podwave_common::config::PlayerConfig;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::decoder::{format_hint, StreamDecoder};
use super::output::{AudioOutput, StereoFrame};
use super::resampler::Resampler;
use super::{AudioResource, ResourceError, ResourceEvent};

const EVENT_CAPACITY: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fully decoded stream at the device rate
struct Track {
    url: String,
    samples: Vec<f32>,
    /// Read position in frames; fractional when rate != 1
    cursor: f64,
}

impl Track {
    fn frames(&self) -> usize {
        self.samples.len() / 2
    }
}

/// State shared with the output thread and the progress task
struct Shared {
    track: Mutex<Option<Track>>,
    source: Mutex<Option<String>>,
    /// Seek target requested before the track finished loading
    pending_position: Mutex<f64>,
    playing: AtomicBool,
    /// Set by the output thread when the cursor runs off the end
    ended: AtomicBool,
    rate_bits: AtomicU64,
}

impl Shared {
    fn rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }

    /// Render callback body; runs on the real-time audio thread
    fn next_frame(&self) -> StereoFrame {
        if !self.playing.load(Ordering::Relaxed) {
            return StereoFrame::SILENCE;
        }
        // never block the audio thread
        let Ok(mut guard) = self.track.try_lock() else {
            return StereoFrame::SILENCE;
        };
        let Some(track) = guard.as_mut() else {
            return StereoFrame::SILENCE;
        };

        let frames = track.frames();
        let index = track.cursor as usize;
        if index + 1 >= frames {
            track.cursor = frames as f64;
            self.playing.store(false, Ordering::SeqCst);
            self.ended.store(true, Ordering::SeqCst);
            return StereoFrame::SILENCE;
        }

        let frac = (track.cursor - index as f64) as f32;
        let s = &track.samples;
        let lerp = |a: f32, b: f32| a + (b - a) * frac;
        let frame = StereoFrame {
            left: lerp(s[index * 2], s[index * 2 + 2]),
            right: lerp(s[index * 2 + 1], s[index * 2 + 3]),
        };
        track.cursor += self.rate();
        frame
    }

    /// Move the cursor, or remember the target until a track is installed.
    ///
    /// Negative and non-finite targets map to the start; targets past the
    /// end clamp to the last frame.
    fn seek(&self, seconds: f64, device_rate: u32) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if let Some(track) = lock(&self.track).as_mut() {
            let frames = track.frames() as f64;
            track.cursor = (seconds * device_rate as f64).min(frames);
            return;
        }
        *lock(&self.pending_position) = seconds;
    }

    /// Install a decoded track, consuming any pending seek
    fn install(&self, url: String, samples: Vec<f32>, device_rate: u32) {
        let start = std::mem::take(&mut *lock(&self.pending_position));
        let mut track = Track { url, samples, cursor: 0.0 };
        track.cursor = (start * device_rate as f64).min(track.frames() as f64);
        *lock(&self.track) = Some(track);
    }

    fn progress(&self, device_rate: u32) -> (f64, Option<f64>) {
        let rate = device_rate as f64;
        if let Some(track) = lock(&self.track).as_ref() {
            return (track.cursor / rate, Some(track.frames() as f64 / rate));
        }
        (*lock(&self.pending_position), None)
    }
}

/// Audio resource playing through a local output device
pub struct DeviceResource {
    shared: Arc<Shared>,
    client: reqwest::Client,
    events: broadcast::Sender<ResourceEvent>,
    /// Bumped by `set_source` and `pause`; a pending `play()` that sees a
    /// change fails with `Interrupted`
    requests: watch::Sender<u64>,
    /// Serializes stream downloads so concurrent `play()` calls share one
    load_lock: tokio::sync::Mutex<()>,
    device_rate: u32,
    /// Dropping this sender stops the output thread
    _stop_output: mpsc::Sender<()>,
}

impl DeviceResource {
    /// Open the output device and start the progress reporter.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &PlayerConfig) -> Result<Self, ResourceError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ResourceError::Output(format!("No async runtime: {}", e)))?;

        let shared = Arc::new(Shared {
            track: Mutex::new(None),
            source: Mutex::new(None),
            pending_position: Mutex::new(0.0),
            playing: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            rate_bits: AtomicU64::new(config.default_playback_rate.to_bits()),
        });

        let (device_rate, stop_output) =
            spawn_output_thread(config.audio_device.clone(), Arc::clone(&shared))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1) * 4))
            .build()
            .map_err(|e| ResourceError::Output(format!("Failed to build HTTP client: {}", e)))?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (requests, _) = watch::channel(0u64);

        runtime.spawn(report_progress(
            Arc::downgrade(&shared),
            events.clone(),
            device_rate,
            Duration::from_millis(config.progress_interval_ms.max(1)),
        ));

        info!("Audio resource ready ({} Hz)", device_rate);
        Ok(Self {
            shared,
            client,
            events,
            requests,
            load_lock: tokio::sync::Mutex::new(()),
            device_rate,
            _stop_output: stop_output,
        })
    }

    fn interrupt_pending(&self) {
        self.requests.send_modify(|n| *n = n.wrapping_add(1));
    }

    fn is_loaded(&self, url: &str) -> bool {
        lock(&self.shared.track)
            .as_ref()
            .map(|t| t.url == url)
            .unwrap_or(false)
    }

    /// Download, decode and resample a stream to the device rate
    async fn fetch_track(&self, url: &str) -> Result<Vec<f32>, ResourceError> {
        debug!("Fetching stream {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ResourceError::Load(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResourceError::Load(format!("HTTP {} from {}", status, url)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let hint = format_hint(content_type.as_deref(), url);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ResourceError::Load(e.to_string()))?;

        let device_rate = self.device_rate;
        tokio::task::spawn_blocking(move || {
            let audio = StreamDecoder::decode_bytes(bytes.to_vec(), hint)?;
            Resampler::resample(&audio.samples, audio.sample_rate, device_rate)
        })
        .await
        .map_err(|e| ResourceError::Decode(format!("Decode task failed: {}", e)))?
    }

    fn start_output(&self) {
        if let Some(track) = lock(&self.shared.track).as_mut() {
            // replay from the top after the end was reached
            if track.cursor as usize + 1 >= track.frames() {
                track.cursor = 0.0;
            }
        }
        self.shared.ended.store(false, Ordering::SeqCst);
        if !self.shared.playing.swap(true, Ordering::SeqCst) {
            let _ = self.events.send(ResourceEvent::Started);
        }
    }
}

#[async_trait]
impl AudioResource for DeviceResource {
    fn set_source(&self, url: &str) {
        self.interrupt_pending();
        if self.shared.playing.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(ResourceEvent::Paused);
        }
        self.shared.ended.store(false, Ordering::SeqCst);
        *lock(&self.shared.track) = None;
        *lock(&self.shared.pending_position) = 0.0;
        *lock(&self.shared.source) = Some(url.to_string());
        debug!("Source set to {}", url);
    }

    async fn play(&self) -> Result<(), ResourceError> {
        let mut requests = self.requests.subscribe();
        let request = *requests.borrow_and_update();
        let url = lock(&self.shared.source)
            .clone()
            .ok_or(ResourceError::NoSource)?;

        let prepare = async {
            let _guard = self.load_lock.lock().await;
            if !self.is_loaded(&url) {
                let samples = self.fetch_track(&url).await?;
                self.shared.install(url.clone(), samples, self.device_rate);
            }
            Ok::<(), ResourceError>(())
        };

        tokio::select! {
            result = prepare => result?,
            _ = requests.changed() => return Err(ResourceError::Interrupted),
        }

        if *self.requests.borrow() != request || !self.is_loaded(&url) {
            return Err(ResourceError::Interrupted);
        }

        self.start_output();
        Ok(())
    }

    fn pause(&self) {
        self.interrupt_pending();
        if self.shared.playing.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(ResourceEvent::Paused);
        }
    }

    fn is_paused(&self) -> bool {
        !self.shared.playing.load(Ordering::SeqCst)
    }

    fn set_position(&self, seconds: f64) {
        self.shared.seek(seconds, self.device_rate);
    }

    fn position(&self) -> f64 {
        self.shared.progress(self.device_rate).0
    }

    fn duration(&self) -> Option<f64> {
        self.shared.progress(self.device_rate).1
    }

    fn set_rate(&self, rate: f64) {
        if rate.is_finite() && rate > 0.0 {
            self.shared.rate_bits.store(rate.to_bits(), Ordering::Relaxed);
        } else {
            warn!("Ignoring invalid playback rate {}", rate);
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }
}

/// Start the output thread and wait for the device to open.
///
/// Returns the device sample rate and the sender whose drop stops the thread.
fn spawn_output_thread(
    device_name: Option<String>,
    shared: Arc<Shared>,
) -> Result<(u32, mpsc::Sender<()>), ResourceError> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, ResourceError>>();
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    std::thread::Builder::new()
        .name("podwave-output".to_string())
        .spawn(move || {
            let mut output = match AudioOutput::open(device_name.as_deref()) {
                Ok(output) => output,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = output.start(move || shared.next_frame()) {
                let _ = ready_tx.send(Err(e));
                return;
            }
            let _ = ready_tx.send(Ok(output.sample_rate()));

            // parked until the resource is dropped
            let _ = stop_rx.recv();
            output.stop();
        })
        .map_err(|e| ResourceError::Output(format!("Failed to spawn output thread: {}", e)))?;

    let device_rate = ready_rx.recv().map_err(|_| {
        ResourceError::Output("Output thread exited during startup".to_string())
    })??;
    Ok((device_rate, stop_tx))
}

/// Emit `TimeUpdate` while playing and `Ended` when the output runs dry
async fn report_progress(
    shared: Weak<Shared>,
    events: broadcast::Sender<ResourceEvent>,
    device_rate: u32,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };

        if shared.ended.swap(false, Ordering::SeqCst) {
            let (_, duration) = shared.progress(device_rate);
            let _ = events.send(ResourceEvent::TimeUpdate {
                position_seconds: duration.unwrap_or(0.0),
                duration_seconds: duration,
            });
            let _ = events.send(ResourceEvent::Ended);
        } else if shared.playing.load(Ordering::SeqCst) {
            let (position_seconds, duration_seconds) = shared.progress(device_rate);
            let _ = events.send(ResourceEvent::TimeUpdate {
                position_seconds,
                duration_seconds,
            });
        }
    }
    debug!("Progress reporter stopped");
}
