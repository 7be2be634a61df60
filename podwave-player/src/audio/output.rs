//! Audio output using cpal
//!
//! Opens an output device (falling back to the system default) and drives a
//! stream from a per-frame render callback. `cpal::Stream` is not `Send`, so
//! an `AudioOutput` must live and die on the thread that created it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{debug, error, info, warn};

use super::ResourceError;

/// Preferred device rate when the device supports it
const PREFERRED_SAMPLE_RATE: u32 = 44100;

/// One stereo output frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub const SILENCE: StereoFrame = StereoFrame { left: 0.0, right: 0.0 };
}

/// Audio output manager using cpal
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
}

impl AudioOutput {
    /// Open an output device.
    ///
    /// A named device that cannot be found falls back to the default device.
    pub fn open(device_name: Option<&str>) -> Result<Self, ResourceError> {
        let host = cpal::default_host();

        let named = match device_name {
            Some(name) => {
                let mut devices = host.output_devices().map_err(|e| {
                    ResourceError::Output(format!("Failed to enumerate devices: {}", e))
                })?;
                let found = devices.find(|d| d.name().ok().as_deref() == Some(name));
                if found.is_none() {
                    warn!("Audio device '{}' not found, falling back to default device", name);
                }
                found
            }
            None => None,
        };

        let device = match named {
            Some(device) => device,
            None => host.default_output_device().ok_or_else(|| {
                ResourceError::Output("No default output device found".to_string())
            })?,
        };
        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let (config, sample_format) = Self::best_config(&device)?;
        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            error_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Prefer 44.1 kHz stereo f32, else the device default
    fn best_config(device: &Device) -> Result<(StreamConfig, SampleFormat), ResourceError> {
        let preferred = device
            .supported_output_configs()
            .map_err(|e| ResourceError::Output(format!("Failed to get device configs: {}", e)))?
            .find(|c| {
                c.channels() == 2
                    && c.sample_format() == SampleFormat::F32
                    && c.min_sample_rate().0 <= PREFERRED_SAMPLE_RATE
                    && c.max_sample_rate().0 >= PREFERRED_SAMPLE_RATE
            });

        if let Some(supported) = preferred {
            let format = supported.sample_format();
            let config = supported
                .with_sample_rate(cpal::SampleRate(PREFERRED_SAMPLE_RATE))
                .config();
            return Ok((config, format));
        }

        let supported = device
            .default_output_config()
            .map_err(|e| ResourceError::Output(format!("Failed to get default config: {}", e)))?;
        Ok((supported.config(), supported.sample_format()))
    }

    /// Start the stream. `render` runs on the real-time audio thread once per
    /// output frame and must not block.
    pub fn start<F>(&mut self, render: F) -> Result<(), ResourceError>
    where
        F: FnMut() -> StereoFrame + Send + 'static,
    {
        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32, F>(render)?,
            SampleFormat::I16 => self.build_stream::<i16, F>(render)?,
            SampleFormat::U16 => self.build_stream::<u16, F>(render)?,
            other => {
                return Err(ResourceError::Output(format!(
                    "Unsupported sample format: {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| ResourceError::Output(format!("Failed to start stream: {}", e)))?;
        self.stream = Some(stream);
        info!("Audio stream started");
        Ok(())
    }

    fn build_stream<T, F>(&self, mut render: F) -> Result<Stream, ResourceError>
    where
        T: SizedSample + FromSample<f32>,
        F: FnMut() -> StereoFrame + Send + 'static,
    {
        let channels = self.config.channels as usize;
        let error_flag = Arc::clone(&self.error_flag);

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let StereoFrame { left, right } = render();
                        for (i, sample) in frame.iter_mut().enumerate() {
                            let value = match i {
                                0 => left,
                                1 => right,
                                _ => 0.0,
                            };
                            *sample = T::from_sample(value.clamp(-1.0, 1.0));
                        }
                        if channels == 1 {
                            frame[0] = T::from_sample(((left + right) * 0.5).clamp(-1.0, 1.0));
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| ResourceError::Output(format!("Failed to build stream: {}", e)))
    }

    /// Stop and release the stream
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause stream: {}", e);
            }
            info!("Audio stream stopped");
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// True once the device has reported a stream error
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
