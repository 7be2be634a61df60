//! Playback rate rules

use crate::error::{Error, Result};

/// Rates offered by the rate button, in cycle order
pub const RATE_CYCLE: [f64; 5] = [1.0, 1.25, 1.5, 1.75, 2.0];

/// Accept only finite, positive rates
pub fn validate_rate(rate: f64) -> Result<f64> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(Error::InvalidRate(rate))
    }
}

/// Next rate in the cycle; a rate outside the cycle restarts at 1x
pub fn next_rate(current: f64) -> f64 {
    RATE_CYCLE
        .iter()
        .position(|r| (r - current).abs() < 1e-9)
        .map(|i| RATE_CYCLE[(i + 1) % RATE_CYCLE.len()])
        .unwrap_or(RATE_CYCLE[0])
}
