//! Human-readable time formatting
//!
//! Clock-style strings used by listings and player surfaces.

/// Seconds in an hour; durations at or above switch to `H:MM:SS`
const HOUR_SECONDS: u64 = 3600;

/// Format seconds as a player clock.
///
/// - Under one hour: `M:SS` (minutes are not padded)
/// - One hour or more: `H:MM:SS`
///
/// Negative and non-finite inputs render as `0:00`. Fractions are truncated,
/// matching how a progress readout ticks.
///
/// # Examples
///
/// ```
/// use podwave_common::human_time::format_clock;
///
/// assert_eq!(format_clock(0.0), "0:00");
/// assert_eq!(format_clock(725.4), "12:05");
/// assert_eq!(format_clock(3661.0), "1:01:01");
/// ```
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.trunc() as u64
    } else {
        0
    };

    let hours = total / HOUR_SECONDS;
    let mins = (total % HOUR_SECONDS) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

/// Format a remaining-time readout (`-M:SS`) from position and duration.
///
/// Returns `None` when the duration is unknown.
///
/// ```
/// use podwave_common::human_time::format_remaining;
///
/// assert_eq!(format_remaining(60.0, Some(125.0)).as_deref(), Some("-1:05"));
/// assert_eq!(format_remaining(10.0, None), None);
/// ```
pub fn format_remaining(position_seconds: f64, duration_seconds: Option<f64>) -> Option<String> {
    let duration = duration_seconds.filter(|d| d.is_finite())?;
    let remaining = (duration - position_seconds).max(0.0);
    Some(format!("-{}", format_clock(remaining)))
}

/// Format a playback rate the way the rate button shows it (`1x`, `1.25x`).
///
/// ```
/// use podwave_common::human_time::format_rate;
///
/// assert_eq!(format_rate(1.0), "1x");
/// assert_eq!(format_rate(1.5), "1.5x");
/// assert_eq!(format_rate(1.75), "1.75x");
/// ```
pub fn format_rate(rate: f64) -> String {
    let mut text = format!("{:.2}", rate);
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    format!("{}x", text)
}
