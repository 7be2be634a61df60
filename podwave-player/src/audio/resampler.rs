//! Audio resampling using rubato
//!
//! Converts decoded stereo PCM to the output device's sample rate.

use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

use super::ResourceError;

/// Frames fed to rubato per call
const CHUNK_FRAMES: usize = 4096;

/// Stereo resampler
pub struct Resampler;

impl Resampler {
    /// Resample interleaved stereo from `input_rate` to `output_rate`.
    ///
    /// Returns a copy when the rates already match.
    pub fn resample(
        input: &[f32],
        input_rate: u32,
        output_rate: u32,
    ) -> Result<Vec<f32>, ResourceError> {
        if input_rate == output_rate {
            return Ok(input.to_vec());
        }
        if input_rate == 0 || output_rate == 0 {
            return Err(ResourceError::Decode(format!(
                "Cannot resample {} Hz to {} Hz",
                input_rate, output_rate
            )));
        }

        debug!("Resampling {} Hz -> {} Hz", input_rate, output_rate);

        let mut resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            CHUNK_FRAMES,
            2,
        )
        .map_err(|e| ResourceError::Decode(format!("Failed to create resampler: {}", e)))?;

        let planar = deinterleave(input);
        let total_frames = planar[0].len();
        let ratio = output_rate as f64 / input_rate as f64;
        let expected = (total_frames as f64 * ratio).ceil() as usize;
        let mut output = Vec::with_capacity(expected * 2 + CHUNK_FRAMES * 2);

        let mut offset = 0;
        while offset + CHUNK_FRAMES <= total_frames {
            let chunk = [
                &planar[0][offset..offset + CHUNK_FRAMES],
                &planar[1][offset..offset + CHUNK_FRAMES],
            ];
            let out = resampler
                .process(&chunk, None)
                .map_err(|e| ResourceError::Decode(format!("Resampling failed: {}", e)))?;
            interleave_into(&out, &mut output);
            offset += CHUNK_FRAMES;
        }

        if offset < total_frames {
            let tail = [&planar[0][offset..], &planar[1][offset..]];
            let out = resampler
                .process_partial(Some(&tail[..]), None)
                .map_err(|e| ResourceError::Decode(format!("Resampling failed: {}", e)))?;
            interleave_into(&out, &mut output);
        }

        // process_partial pads the tail; trim back to the expected length
        output.truncate(expected * 2);

        debug!("Resampled {} frames to {} frames", total_frames, output.len() / 2);
        Ok(output)
    }
}

/// [L, R, L, R, ...] -> [[L, L, ...], [R, R, ...]]
fn deinterleave(samples: &[f32]) -> [Vec<f32>; 2] {
    let frames = samples.len() / 2;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in samples.chunks_exact(2) {
        left.push(frame[0]);
        right.push(frame[1]);
    }
    [left, right]
}

fn interleave_into(planar: &[Vec<f32>], output: &mut Vec<f32>) {
    if planar.len() < 2 {
        return;
    }
    for (l, r) in planar[0].iter().zip(planar[1].iter()) {
        output.push(*l);
        output.push(*r);
    }
}
