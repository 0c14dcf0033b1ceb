//! Conversions between AVTransport time strings and seconds.
//!
//! AVTransport reports durations and positions as `H+:MM:SS[.F+]` (the hour
//! field may have any number of digits) or `NOT_IMPLEMENTED`.

use crate::errors::PlaybackError;

/// Formats a duration in seconds as HH:MM:SS.
///
/// # Examples
/// ```
/// # use pmoplayback::time_utils::format_hhmmss;
/// assert_eq!(format_hhmmss(0), "00:00:00");
/// assert_eq!(format_hhmmss(61), "00:01:01");
/// assert_eq!(format_hhmmss(3661), "01:01:01");
/// ```
pub fn format_hhmmss(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Parses `H+:MM:SS[.F+]` into whole seconds, dropping any fraction.
///
/// # Examples
/// ```
/// # use pmoplayback::time_utils::parse_hhmmss;
/// assert_eq!(parse_hhmmss("0:03:25").unwrap(), 205);
/// assert_eq!(parse_hhmmss("01:00:00.500").unwrap(), 3600);
/// assert!(parse_hhmmss("3:25").is_err());
/// ```
pub fn parse_hhmmss(input: &str) -> Result<u64, PlaybackError> {
    let trimmed = input.trim();
    let whole = trimmed.split('.').next().unwrap_or_default();
    let parts: Vec<&str> = whole.split(':').collect();

    if parts.len() != 3 {
        return Err(PlaybackError::InvalidTimeFormat(format!(
            "'{}': expected H+:MM:SS",
            input
        )));
    }

    let mut total = 0u64;
    for (i, part) in parts.iter().enumerate() {
        let value = part.parse::<u64>().map_err(|_| {
            PlaybackError::InvalidTimeFormat(format!(
                "invalid numeric value '{}' in '{}'",
                part, input
            ))
        })?;
        if i > 0 && value >= 60 {
            return Err(PlaybackError::InvalidTimeFormat(format!(
                "'{}' out of range in '{}'",
                part, input
            )));
        }
        total = total
            .checked_mul(60)
            .and_then(|t| t.checked_add(value))
            .ok_or_else(|| PlaybackError::InvalidTimeFormat(format!("'{}' too large", input)))?;
    }

    Ok(total)
}

/// Lenient variant used on device-reported values.
///
/// Returns `None` for `NOT_IMPLEMENTED`, empty or malformed strings.
pub fn parse_upnp_time(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("NOT_IMPLEMENTED") {
        return None;
    }
    parse_hhmmss(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_large_hours() {
        assert_eq!(format_hhmmss(100 * 3600 + 5), "100:00:05");
    }

    #[test]
    fn parse_accepts_unpadded_and_long_hours() {
        assert_eq!(parse_hhmmss("1:02:03").unwrap(), 3723);
        assert_eq!(parse_hhmmss("123:00:00").unwrap(), 123 * 3600);
    }

    #[test]
    fn parse_drops_fraction() {
        assert_eq!(parse_hhmmss("00:00:09.999").unwrap(), 9);
    }

    #[test]
    fn parse_rejects_out_of_range_fields() {
        assert!(parse_hhmmss("00:61:00").is_err());
        assert!(parse_hhmmss("00:00:60").is_err());
        assert!(parse_hhmmss("aa:00:00").is_err());
    }

    #[test]
    fn device_values_not_implemented_are_unknown() {
        assert_eq!(parse_upnp_time("NOT_IMPLEMENTED"), None);
        assert_eq!(parse_upnp_time(""), None);
        assert_eq!(parse_upnp_time("garbage"), None);
        assert_eq!(parse_upnp_time("0:04:10"), Some(250));
    }

    #[test]
    fn parse_rejects_overflowing_hours() {
        assert!(matches!(
            parse_hhmmss("999999999999999999:00:00"),
            Err(PlaybackError::InvalidTimeFormat(_))
        ));
        assert_eq!(parse_upnp_time("999999999999999999:00:00"), None);
        assert!(parse_hhmmss("99999999999999999999999:00:00").is_err());
    }
}
