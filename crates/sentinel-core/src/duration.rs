//! The time-window duration grammar: `^([1-9][0-9]*)(s|m|h|d|w)$` (§6.6).

use crate::error::SentinelError;

const SECOND_MS: i64 = 1000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Parse a duration string into milliseconds.
///
/// Accepts `<positive-integer><unit>` with units `s`, `m`, `h`, `d`, `w`.
/// Leading zeros (`"01d"`) and a zero magnitude (`"0s"`) are rejected, as is
/// any trailing or leading whitespace.
pub fn parse_duration(s: &str) -> Result<i64, SentinelError> {
    parse_duration_at(s, "window")
}

/// Same as [`parse_duration`] but attaches a caller-supplied field path to
/// the error, for compile-time diagnostics.
pub fn parse_duration_at(s: &str, field_path: &str) -> Result<i64, SentinelError> {
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return Err(SentinelError::DurationFormat {
            field_path: field_path.to_owned(),
            value: s.to_owned(),
        });
    }

    let (digits, unit) = bytes.split_at(bytes.len() - 1);
    let unit = unit[0] as char;

    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(SentinelError::DurationFormat {
            field_path: field_path.to_owned(),
            value: s.to_owned(),
        });
    }
    // Reject leading zeros ("01d") and a bare zero magnitude ("0d").
    if digits[0] == b'0' {
        return Err(SentinelError::DurationFormat {
            field_path: field_path.to_owned(),
            value: s.to_owned(),
        });
    }

    let magnitude: i64 = std::str::from_utf8(digits)
        .ok()
        .and_then(|d| d.parse().ok())
        .ok_or_else(|| SentinelError::DurationFormat {
            field_path: field_path.to_owned(),
            value: s.to_owned(),
        })?;

    let unit_ms = match unit {
        's' => SECOND_MS,
        'm' => MINUTE_MS,
        'h' => HOUR_MS,
        'd' => DAY_MS,
        'w' => WEEK_MS,
        _ => {
            return Err(SentinelError::DurationFormat {
                field_path: field_path.to_owned(),
                value: s.to_owned(),
            });
        }
    };

    magnitude
        .checked_mul(unit_ms)
        .ok_or_else(|| SentinelError::DurationFormat {
            field_path: field_path.to_owned(),
            value: s.to_owned(),
        })
}

/// Format a millisecond duration back into its canonical string form.
///
/// Picks the largest unit that divides the duration evenly, falling back to
/// seconds. Not guaranteed to invert every millisecond value — only
/// canonical strings produced by [`parse_duration`] round-trip exactly
/// (Testable Property 6).
#[must_use]
pub fn format_duration(ms: i64) -> String {
    if ms > 0 && ms % WEEK_MS == 0 {
        format!("{}w", ms / WEEK_MS)
    } else if ms > 0 && ms % DAY_MS == 0 {
        format!("{}d", ms / DAY_MS)
    } else if ms > 0 && ms % HOUR_MS == 0 {
        format!("{}h", ms / HOUR_MS)
    } else if ms > 0 && ms % MINUTE_MS == 0 {
        format!("{}m", ms / MINUTE_MS)
    } else {
        format!("{}s", ms / SECOND_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration("30s").unwrap(), 30 * SECOND_MS);
        assert_eq!(parse_duration("5m").unwrap(), 5 * MINUTE_MS);
        assert_eq!(parse_duration("2h").unwrap(), 2 * HOUR_MS);
        assert_eq!(parse_duration("1d").unwrap(), DAY_MS);
        assert_eq!(parse_duration("3w").unwrap(), 3 * WEEK_MS);
    }

    #[test]
    fn rejects_zero_magnitude() {
        assert!(parse_duration("0s").is_err());
    }

    #[test]
    fn rejects_leading_zero() {
        assert!(parse_duration("01d").is_err());
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_duration("5y").is_err());
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("d").is_err());
    }

    #[test]
    fn format_picks_largest_clean_unit() {
        assert_eq!(format_duration(WEEK_MS), "1w");
        assert_eq!(format_duration(DAY_MS), "1d");
        assert_eq!(format_duration(HOUR_MS), "1h");
        assert_eq!(format_duration(MINUTE_MS), "1m");
        assert_eq!(format_duration(30 * SECOND_MS), "30s");
    }

    #[test]
    fn roundtrip_on_canonical_strings() {
        for s in ["1s", "30s", "5m", "2h", "1d", "7d", "3w"] {
            let ms = parse_duration(s).unwrap();
            assert_eq!(format_duration(ms), s, "roundtrip failed for {s}");
        }
    }

    #[test]
    fn error_carries_field_path() {
        let err = parse_duration_at("bogus", "conditions[0].window").unwrap_err();
        assert_eq!(err.field_path(), Some("conditions[0].window"));
    }
}
