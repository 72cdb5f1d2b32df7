//! Time filter parsing and duration formatting.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::error::{AppError, Result};

static RELATIVE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(\d+)([smhd])$").expect("relative time pattern is valid")
});

/// Timestamps without an offset, read as UTC. Fractional seconds are optional.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a query time bound.
///
/// Accepts, in order: RFC 3339, `YYYY-MM-DDTHH:MM:SS[.fff]`,
/// `YYYY-MM-DD HH:MM:SS[.fff]` and `YYYY-MM-DD` (all UTC), a relative `N[s|m|h|d]` meaning "N units before `now"` (a
/// leading `-` is allowed and means the same), or Unix epoch seconds.
pub fn parse_time_filter(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    let invalid = || {
        AppError::invalid_query(format!(
            "invalid time '{input}': use unix seconds, a timestamp, or forms like `1d`, `5h`"
        ))
    };

    if input.is_empty() {
        return Err(invalid());
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Some(caps) = RELATIVE_TIME.captures(input) {
        let value: i64 = caps[1].parse().map_err(|_| invalid())?;
        let delta = match &caps[2] {
            "s" => chrono::Duration::try_seconds(value),
            "m" => chrono::Duration::try_minutes(value),
            "h" => chrono::Duration::try_hours(value),
            "d" => chrono::Duration::try_days(value),
            _ => None,
        }
        .ok_or_else(invalid)?;
        return now.checked_sub_signed(delta).ok_or_else(invalid);
    }

    if let Ok(secs) = input.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0).ok_or_else(invalid);
    }

    Err(invalid())
}

/// Short human-readable duration, e.g. `4m 05s` or `850ms`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return format!("{}ms", duration.as_millis());
    }
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
