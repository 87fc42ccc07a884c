//! Elapsed-time formatting for timer and countdown display

/// Format a number of seconds as `HH:MM:SS`.
///
/// Hours are not capped, so 100 hours renders as `100:00:00`.
pub fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Parse an `HH:MM:SS` string back into seconds.
pub fn parse_elapsed(value: &str) -> Option<u64> {
    let mut parts = value.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let secs: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || secs >= 60 {
        return None;
    }
    hours.checked_mul(3600)?.checked_add(minutes * 60 + secs)
}
