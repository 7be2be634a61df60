//! Audio decoder using symphonia
//!
//! Decodes a fully downloaded narration stream (MP3, AAC/M4A, Vorbis, FLAC,
//! WAV) to interleaved stereo f32 PCM at the source sample rate.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};
use url::Url;

use super::ResourceError;

/// Decoded PCM, always two interleaved channels
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved stereo samples: [L, R, L, R, ...]
    pub samples: Vec<f32>,
    /// Source sample rate (before resampling)
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Stateless symphonia front end
pub struct StreamDecoder;

impl StreamDecoder {
    /// Decode an in-memory stream.
    ///
    /// `extension` is a format hint (`"mp3"`, `"m4a"`, ...); probing still
    /// works without it. Corrupt packets are skipped; a stream that yields no
    /// audio at all is an error.
    pub fn decode_bytes(
        bytes: Vec<u8>,
        extension: Option<&str>,
    ) -> Result<DecodedAudio, ResourceError> {
        debug!("Decoding {} bytes (hint: {:?})", bytes.len(), extension);

        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| ResourceError::Decode(format!("Unrecognized audio format: {}", e)))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| ResourceError::Decode("No audio track found".to_string()))?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| ResourceError::Decode(format!("Unsupported codec: {}", e)))?;

        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut samples = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => {
                    warn!("Stopping at unreadable packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => return Err(ResourceError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            if sample_rate == 0 {
                sample_rate = spec.rate;
            }
            let channels = spec.channels.count();

            let too_small = sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < decoded.capacity() * channels);
            if too_small {
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);
            push_stereo(buf.samples(), channels, &mut samples);
        }

        if samples.is_empty() || sample_rate == 0 {
            return Err(ResourceError::Decode("Stream contained no audio".to_string()));
        }

        let audio = DecodedAudio { samples, sample_rate };
        debug!(
            "Decoded {} frames at {} Hz ({:.1}s)",
            audio.frames(),
            audio.sample_rate,
            audio.duration_seconds()
        );
        Ok(audio)
    }
}

/// Append interleaved samples as stereo: mono is duplicated, extra channels
/// beyond the first two are dropped.
fn push_stereo(interleaved: &[f32], channels: usize, output: &mut Vec<f32>) {
    match channels {
        0 => {}
        1 => {
            output.reserve(interleaved.len() * 2);
            for &s in interleaved {
                output.push(s);
                output.push(s);
            }
        }
        2 => output.extend_from_slice(interleaved),
        n => {
            for frame in interleaved.chunks_exact(n) {
                output.push(frame[0]);
                output.push(frame[1]);
            }
        }
    }
}

/// Guess a symphonia extension hint from a Content-Type header or URL
pub fn format_hint(content_type: Option<&str>, url: &str) -> Option<&'static str> {
    let from_mime = content_type.and_then(|ct| {
        let mime = ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase();
        match mime.as_str() {
            "audio/mpeg" | "audio/mp3" => Some("mp3"),
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
            "audio/ogg" | "audio/vorbis" => Some("ogg"),
            "audio/flac" | "audio/x-flac" => Some("flac"),
            "audio/aac" => Some("aac"),
            "audio/mp4" | "audio/x-m4a" => Some("m4a"),
            _ => None,
        }
    });
    if from_mime.is_some() {
        return from_mime;
    }

    let parsed = Url::parse(url).ok()?;
    let file_name = parsed.path_segments()?.next_back()?;
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "mp3" => Some("mp3"),
        "wav" => Some("wav"),
        "ogg" | "oga" => Some("ogg"),
        "flac" => Some("flac"),
        "aac" => Some("aac"),
        "m4a" | "mp4" => Some("m4a"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_is_duplicated() {
        let mut out = Vec::new();
        push_stereo(&[0.1, 0.2], 1, &mut out);
        assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_surround_keeps_front_pair() {
        let mut out = Vec::new();
        push_stereo(&[0.1, 0.2, 0.9, 0.9, 0.3, 0.4, 0.9, 0.9], 4, &mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_format_hint_prefers_content_type() {
        let stream = "https://cdn.example/42/stream";
        assert_eq!(format_hint(Some("audio/mpeg"), stream), Some("mp3"));
        assert_eq!(format_hint(Some("audio/x-wav; charset=binary"), "x.mp3"), Some("wav"));
        let octets = Some("application/octet-stream");
        assert_eq!(format_hint(octets, "https://cdn.example/42/stream/"), None);
    }

    #[test]
    fn test_format_hint_reads_url_path_only() {
        let hint = |url| format_hint(None, url);
        assert_eq!(hint("https://cdn.example/a/b.M4A?sig=1"), Some("m4a"));
        assert_eq!(hint("https://cdn.example/a/b.flac#t=30"), Some("flac"));
        assert_eq!(hint("https://cdn.example/stream?file=a.mp3"), None);
        assert_eq!(hint("https://cdn.example/stream#a.ogg"), None);
        assert_eq!(hint("https://cdn.example/a.mp3/stream"), None);
        assert_eq!(hint("not a url.mp3"), None);
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let result = StreamDecoder::decode_bytes(vec![0u8; 512], None);
        assert!(matches!(result, Err(ResourceError::Decode(_))));
    }
}
