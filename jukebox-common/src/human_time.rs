//! Human-readable duration formatting for status output
//!
//! Track lengths render as `M:SS` below an hour and `H:MM:SS` above it.

/// Seconds in one hour, the switch point between the two formats
const HOUR: u64 = 3600;

/// Format a track duration in seconds.
///
/// # Examples
///
/// ```
/// use jukebox_common::human_time::format_duration;
///
/// assert_eq!(format_duration(0), "0:00");
/// assert_eq!(format_duration(185), "3:05");
/// assert_eq!(format_duration(3661), "1:01:01");
/// ```
pub fn format_duration(seconds: u64) -> String {
    if seconds < HOUR {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    } else {
        let hours = seconds / HOUR;
        let mins = (seconds % HOUR) / 60;
        let secs = seconds % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    }
}

/// Format an optional duration, rendering `None` as "live"
///
/// ```
/// use jukebox_common::human_time::format_duration_opt;
///
/// assert_eq!(format_duration_opt(Some(59)), "0:59");
/// assert_eq!(format_duration_opt(None), "live");
/// ```
pub fn format_duration_opt(seconds: Option<u64>) -> String {
    match seconds {
        Some(seconds) => format_duration(seconds),
        None => "live".to_string(),
    }
}
