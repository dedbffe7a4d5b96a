/*!
 * Human timecode parsing and formatting.
 *
 * Accepted input forms:
 * - `HH:MM:SS[.fff]`
 * - `MM:SS[.fff]`
 * - `SS[.fff]`
 *
 * Values are computed in whole milliseconds and converted to seconds at the end,
 * so the result never depends on float parsing or the current locale.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::TimecodeError;

// @const: One field of a timecode, digits only
static FIELD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

// @const: Seconds field with an optional 1-3 digit fraction
static SECONDS_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)(?:\.(\d{1,3}))?$").unwrap());

/// Parse a timecode string into seconds
pub fn parse_timecode(text: &str) -> Result<f64, TimecodeError> {
    parse_timecode_ms(text).map(|ms| ms as f64 / 1000.0)
}

/// Parse a timecode string into whole milliseconds
pub fn parse_timecode_ms(text: &str) -> Result<u64, TimecodeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TimecodeError::invalid(text, "empty timecode"));
    }
    if trimmed.starts_with('-') {
        return Err(TimecodeError::invalid(text, "negative values are not allowed"));
    }

    let groups: Vec<&str> = trimmed.split(':').collect();
    if groups.len() > 3 {
        return Err(TimecodeError::invalid(text, "more than 2 colon-separated groups"));
    }

    let (leading, seconds_field) = groups.split_at(groups.len() - 1);
    let caps = SECONDS_REGEX
        .captures(seconds_field[0])
        .ok_or_else(|| TimecodeError::invalid(text, "seconds field is not numeric"))?;

    let seconds = parse_field(text, &caps[1])?;
    let millis = match caps.get(2) {
        Some(fraction) => {
            // Right-pad so ".5" means 500ms
            let padded = format!("{:0<3}", fraction.as_str());
            parse_field(text, &padded)?
        }
        None => 0,
    };

    if !leading.is_empty() && seconds >= 60 {
        return Err(TimecodeError::invalid(text, format!("seconds must be < 60, got {}", seconds)));
    }

    let mut fields = Vec::with_capacity(leading.len());
    for field in leading {
        if !FIELD_REGEX.is_match(field) {
            return Err(TimecodeError::invalid(text, format!("non-numeric field '{}'", field)));
        }
        fields.push(parse_field(text, field)?);
    }

    let (hours, minutes) = match fields.as_slice() {
        [] => (0, 0),
        [minutes] => (0, *minutes),
        [hours, minutes] => {
            if *minutes >= 60 {
                return Err(TimecodeError::invalid(text, format!("minutes must be < 60, got {}", minutes)));
            }
            (*hours, *minutes)
        }
        _ => unreachable!("group count checked above"),
    };

    let total = hours
        .checked_mul(3_600_000)
        .and_then(|h| minutes.checked_mul(60_000).and_then(|m| h.checked_add(m)))
        .and_then(|hm| seconds.checked_mul(1_000).and_then(|s| hm.checked_add(s)))
        .and_then(|hms| hms.checked_add(millis))
        .ok_or_else(|| TimecodeError::invalid(text, "value out of range"))?;

    Ok(total)
}

fn parse_field(input: &str, field: &str) -> Result<u64, TimecodeError> {
    field
        .parse::<u64>()
        .map_err(|_| TimecodeError::invalid(input, format!("field '{}' out of range", field)))
}

/// Format seconds as `HH:MM:SS.mmm`, rounding to the nearest millisecond
pub fn format_timecode(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;

    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

/// Format a duration in seconds as a short human string ("1h 2m 3s", "45s")
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0s".to_string();
    }

    let whole = seconds as u64;
    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let secs = whole % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{}s", secs));
    }
    parts.join(" ")
}
