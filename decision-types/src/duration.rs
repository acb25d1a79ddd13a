//! Compact signed duration strings.
//!
//! Remaining time on a decision is rendered as a unit breakdown such as
//! `"2h59m59s"`, `"4m0.5s"` or `"750ms"`, with a leading `-` once the
//! decision has already ended. Precision is one millisecond.

use chrono::Duration;
use std::fmt::Write;

use crate::WireError;

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Render a signed duration.
///
/// Hours and minutes are only printed when non-zero or when a larger unit
/// was printed (`"1h0m0s"`). Sub-second durations use `ms`.
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.num_milliseconds();
    if total_ms == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    if total_ms < 0 {
        out.push('-');
    }
    let abs = total_ms.unsigned_abs();

    if abs < MS_PER_SECOND {
        let _ = write!(out, "{abs}ms");
        return out;
    }

    let hours = abs / MS_PER_HOUR;
    let minutes = (abs % MS_PER_HOUR) / MS_PER_MINUTE;
    let seconds = (abs % MS_PER_MINUTE) / MS_PER_SECOND;
    let millis = abs % MS_PER_SECOND;

    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if hours > 0 || minutes > 0 {
        let _ = write!(out, "{minutes}m");
    }
    if millis == 0 {
        let _ = write!(out, "{seconds}s");
    } else {
        let fraction = format!("{millis:03}");
        let _ = write!(out, "{seconds}.{}s", fraction.trim_end_matches('0'));
    }
    out
}

/// Parse a positive duration such as `"4h"`, `"1h30m"` or `"500ms"`.
pub fn parse_duration(input: &str) -> Result<Duration, WireError> {
    let invalid = || WireError::InvalidDuration(input.to_string());
    let parsed = humantime::parse_duration(input.trim()).map_err(|_| invalid())?;
    let duration = Duration::from_std(parsed).map_err(|_| invalid())?;
    if duration <= Duration::zero() {
        return Err(invalid());
    }
    Ok(duration)
}
