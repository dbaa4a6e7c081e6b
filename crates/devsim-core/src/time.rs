//! Telemetry intervals and simulation time expressions.
//!
//! Intervals use the `[d.]hh:mm:ss[.fffffff]` clock form. Simulation start
//! and end times accept `NOW`, `NOW+<ISO-8601 duration>`,
//! `NOW-<ISO-8601 duration>` or an RFC 3339 timestamp.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = 60.0 * MS_PER_SECOND;
const MS_PER_HOUR: f64 = 60.0 * MS_PER_MINUTE;
const MS_PER_DAY: f64 = 24.0 * MS_PER_HOUR;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    #[error("value is empty")]
    Empty,

    #[error("'{0}' is not a [d.]hh:mm:ss interval")]
    Interval(String),

    #[error("'{0}' is not an ISO-8601 duration")]
    IsoDuration(String),

    #[error("'{0}' is not NOW, NOW+/-<duration> or an RFC 3339 timestamp")]
    Expression(String),
}

/// Parse a `[d.]hh:mm[:ss[.fffffff]]` interval.
pub fn parse_interval(input: &str) -> Result<Duration, TimeParseError> {
    let text = input.trim();
    if text.is_empty() {
        return Err(TimeParseError::Empty);
    }
    let err = || TimeParseError::Interval(input.to_string());

    // A leading "d." only counts as days when it comes before the first colon.
    let (days, clock) = match text.split_once('.') {
        Some((days, rest)) if !days.contains(':') => (parse_digits(days).ok_or_else(err)?, rest),
        _ => (0, text),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m] => (*h, *m, "0"),
        [h, m, s] => (*h, *m, *s),
        _ => return Err(err()),
    };

    let (whole_seconds, fraction) = match seconds.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (seconds, None),
    };

    let hours = parse_digits(hours).filter(|h| *h < 24).ok_or_else(err)?;
    let minutes = parse_digits(minutes).filter(|m| *m < 60).ok_or_else(err)?;
    let whole_seconds = parse_digits(whole_seconds).filter(|s| *s < 60).ok_or_else(err)?;
    let nanos = match fraction {
        Some(digits) => parse_fraction_nanos(digits).ok_or_else(err)?,
        None => 0,
    };

    let total_seconds = days
        .checked_mul(86_400)
        .and_then(|s| s.checked_add(hours * 3_600 + minutes * 60 + whole_seconds))
        .ok_or_else(err)?;

    Ok(Duration::new(total_seconds, nanos))
}

/// Parse an ISO-8601 duration such as `P1D`, `PT30M` or `P1DT12H`.
///
/// Years count as 365 days and months as 30 days.
pub fn parse_iso_duration(input: &str) -> Result<chrono::Duration, TimeParseError> {
    let upper = input.trim().to_ascii_uppercase();
    let err = || TimeParseError::IsoDuration(input.to_string());

    let body = upper.strip_prefix('P').ok_or_else(err)?;
    let (date_part, time_part) = match body.split_once('T') {
        Some((_, "")) => return Err(err()),
        Some((date, time)) => (date, time),
        None => (body, ""),
    };

    let date = components(date_part).ok_or_else(err)?;
    let time = components(time_part).ok_or_else(err)?;
    if date.is_empty() && time.is_empty() {
        return Err(err());
    }

    let mut total_ms = 0.0;
    for (value, unit) in date {
        let scale = match unit {
            'Y' => 365.0 * MS_PER_DAY,
            'M' => 30.0 * MS_PER_DAY,
            'W' => 7.0 * MS_PER_DAY,
            'D' => MS_PER_DAY,
            _ => return Err(err()),
        };
        total_ms += value * scale;
    }
    for (value, unit) in time {
        let scale = match unit {
            'H' => MS_PER_HOUR,
            'M' => MS_PER_MINUTE,
            'S' => MS_PER_SECOND,
            _ => return Err(err()),
        };
        total_ms += value * scale;
    }

    if !total_ms.is_finite() || total_ms >= i64::MAX as f64 {
        return Err(err());
    }
    chrono::Duration::try_milliseconds(total_ms.round() as i64).ok_or_else(err)
}

/// Split `1D12H` style text into `(value, unit)` pairs.
fn components(text: &str) -> Option<Vec<(f64, char)>> {
    let mut out = Vec::new();
    let mut number = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(if c == ',' { '.' } else { c });
        } else if c.is_ascii_alphabetic() {
            if number.is_empty() {
                return None;
            }
            out.push((number.parse::<f64>().ok()?, c));
            number.clear();
        } else {
            return None;
        }
    }
    number.is_empty().then_some(out)
}

fn parse_digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn parse_fraction_nanos(digits: &str) -> Option<u32> {
    if digits.is_empty() || digits.len() > 9 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    format!("{digits:0<9}").parse().ok()
}

/// A simulation start or end time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeExpression {
    /// The moment of evaluation, shifted by `offset`.
    Now { offset: chrono::Duration },
    Absolute(DateTime<Utc>),
}

impl TimeExpression {
    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(TimeParseError::Empty);
        }

        let upper = text.to_ascii_uppercase();
        if let Some(rest) = upper.strip_prefix("NOW") {
            let offset = if rest.is_empty() {
                chrono::Duration::zero()
            } else if let Some(duration) = rest.strip_prefix('+') {
                parse_iso_duration(duration)
                    .map_err(|_| TimeParseError::Expression(input.to_string()))?
            } else if let Some(duration) = rest.strip_prefix('-') {
                -parse_iso_duration(duration)
                    .map_err(|_| TimeParseError::Expression(input.to_string()))?
            } else {
                return Err(TimeParseError::Expression(input.to_string()));
            };
            return Ok(Self::Now { offset });
        }

        DateTime::parse_from_rfc3339(text)
            .map(|t| Self::Absolute(t.with_timezone(&Utc)))
            .map_err(|_| TimeParseError::Expression(input.to_string()))
    }

    /// Resolve against `now`. `None` when the result is out of range.
    pub fn resolve(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Now { offset } => now.checked_add_signed(*offset),
            Self::Absolute(at) => Some(*at),
        }
    }
}
