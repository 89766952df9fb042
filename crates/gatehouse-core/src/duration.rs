//! Go-style duration strings.
//!
//! Gateway configuration files express durations the way the Go ecosystem
//! does: a sequence of decimal numbers, each with an optional fraction and a
//! unit suffix, e.g. `"300ms"`, `"1.5h"` or `"2h45m"`. Valid units are `ns`,
//! `us` (or `µs`), `ms`, `s`, `m` and `h`. The bare string `"0"` is accepted.
//!
//! # Example
//!
//! ```
//! use gatehouse_core::duration;
//! use std::time::Duration;
//!
//! assert_eq!(duration::parse("1m30s").unwrap(), Duration::from_secs(90));
//! assert_eq!(duration::parse("1500ms").unwrap(), Duration::from_millis(1500));
//! ```

use std::time::Duration;

use thiserror::Error;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Longest fraction honoured per component; further digits are below 1ns.
const MAX_FRACTION_DIGITS: usize = 18;

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration {input:?}: {reason}")]
pub struct ParseDurationError {
    input: String,
    reason: &'static str,
}

impl ParseDurationError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3_600 * NANOS_PER_SEC),
        _ => None,
    }
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

/// Parses a Go-style duration string.
///
/// Negative durations are rejected since [`Duration`] is unsigned.
pub fn parse(input: &str) -> Result<Duration, ParseDurationError> {
    let trimmed = input.trim();
    let s = trimmed.strip_prefix('+').unwrap_or(trimmed);

    if s.is_empty() {
        return Err(ParseDurationError::new(input, "empty duration"));
    }
    if s.starts_with('-') {
        return Err(ParseDurationError::new(input, "negative durations are not supported"));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total: u128 = 0;
    let mut rest = s;

    while !rest.is_empty() {
        let (int_part, tail) = split_digits(rest);
        let (frac_part, tail) = match tail.strip_prefix('.') {
            Some(after_dot) => split_digits(after_dot),
            None => ("", tail),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseDurationError::new(input, "expected a number"));
        }

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_end);
        if unit.is_empty() {
            return Err(ParseDurationError::new(input, "missing unit"));
        }
        let scale = unit_nanos(unit).ok_or_else(|| ParseDurationError::new(input, "unknown unit"))?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| ParseDurationError::new(input, "number out of range"))?
        };
        let mut value = whole
            .checked_mul(scale)
            .ok_or_else(|| ParseDurationError::new(input, "duration out of range"))?;

        if !frac_part.is_empty() {
            let digits = &frac_part[..frac_part.len().min(MAX_FRACTION_DIGITS)];
            let fraction: u128 = digits
                .parse()
                .map_err(|_| ParseDurationError::new(input, "number out of range"))?;
            let exponent = u32::try_from(digits.len()).unwrap_or(0);
            value += fraction * scale / 10u128.pow(exponent);
        }

        total = total
            .checked_add(value)
            .ok_or_else(|| ParseDurationError::new(input, "duration out of range"))?;
        rest = tail;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC)
        .map_err(|_| ParseDurationError::new(input, "duration out of range"))?;
    let nanos = u32::try_from(total % NANOS_PER_SEC).unwrap_or(0);
    Ok(Duration::new(secs, nanos))
}

/// Formats a duration as a string [`parse`] accepts.
pub fn format(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else if duration.subsec_nanos() % 1_000_000 == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{}ns", duration.as_nanos())
    }
}

/// Serde adapter for `Duration` fields written as Go-style strings.
///
/// ```
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Deserialize)]
/// struct Timeouts {
///     #[serde(with = "gatehouse_core::duration::serde_str")]
///     read: Duration,
/// }
///
/// let t: Timeouts = serde_json::from_str(r#"{"read": "2s"}"#).unwrap();
/// assert_eq!(t.read, Duration::from_secs(2));
/// ```
pub mod serde_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a duration as a string.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format(*duration))
    }

    /// Deserializes a duration from a string.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse(&s).map_err(serde::de::Error::custom)
    }
}
