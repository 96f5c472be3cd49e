//! Formatting helpers shared across UIs.

use chrono::{DateTime, Local, TimeZone, Utc};

/// Format a playback position in seconds as `MM:SS`.
///
/// Minutes are not wrapped into hours (`5400` is `90:00`). Fractions are
/// truncated; negative and non-finite input renders as `00:00`.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Convert epoch seconds (possibly fractional) to a UTC timestamp.
pub fn epoch_to_utc(epoch_secs: f64) -> Option<DateTime<Utc>> {
    if !epoch_secs.is_finite() {
        return None;
    }
    let secs = epoch_secs.floor();
    let nanos = ((epoch_secs - secs) * 1e9) as u32;
    Utc.timestamp_opt(secs as i64, nanos).single()
}

/// Format epoch seconds as a local wall-clock time (`HH:MM:SS`) for log lines.
pub fn format_log_time(epoch_secs: f64) -> String {
    match epoch_to_utc(epoch_secs) {
        Some(ts) => ts.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

/// Format an optional epoch start time as a local date and time, or `-` if missing.
pub fn format_start_time(epoch_secs: Option<f64>) -> String {
    match epoch_secs.and_then(epoch_to_utc) {
        Some(ts) => ts
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "-".to_string(),
    }
}

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}

/// Format an optional epoch timestamp as relative time, or `-` if missing.
pub fn format_relative_epoch(epoch_secs: Option<f64>) -> String {
    match epoch_secs.and_then(epoch_to_utc) {
        Some(ts) => format_relative_time(ts),
        None => "-".to_string(),
    }
}
