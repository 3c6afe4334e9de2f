//! String parameter parsing for the façade: timestamps and durations.

use regex::Regex;

use crate::{RelgraphError, Result};

/// Integer timestamps below this are taken as seconds.
const SECONDS_THRESHOLD: i64 = 1_000_000_000_000;

/// Parse a unix timestamp into milliseconds. Empty means now.
pub fn parse_timestamp(ts: &str) -> Result<i64> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Ok(chrono::Utc::now().timestamp_millis());
    }

    let value: i64 = ts.parse().map_err(|source| RelgraphError::InvalidTimestamp {
        value: ts.to_string(),
        source,
    })?;

    if value < SECONDS_THRESHOLD {
        Ok(value.saturating_mul(1000))
    } else {
        Ok(value)
    }
}

fn unit_nanos(unit: &str) -> Option<f64> {
    let nanos = match unit {
        "ns" => 1.0,
        "us" | "µs" | "μs" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3600e9,
        _ => return None,
    };
    Some(nanos)
}

/// Parse a duration such as `300ms`, `10m`, `1h30m` or `1.5h` into whole
/// milliseconds (truncated). A bare `0` is accepted.
pub fn parse_duration_ms(input: &str) -> Result<i64> {
    let invalid = || RelgraphError::InvalidDuration(input.to_string());

    let s = input.trim();
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if body == "0" {
        return Ok(0);
    }
    if body.is_empty() {
        return Err(invalid());
    }

    let part = Regex::new(r"(\d+(?:\.\d*)?|\.\d+)(ns|us|µs|μs|ms|s|m|h)").map_err(|_| invalid())?;

    let mut total_nanos = 0f64;
    let mut consumed = 0;
    for cap in part.captures_iter(body) {
        let (Some(whole), Some(number), Some(unit)) = (cap.get(0), cap.get(1), cap.get(2)) else {
            return Err(invalid());
        };
        if whole.start() != consumed {
            return Err(invalid());
        }
        consumed = whole.end();

        let number: f64 = number.as_str().parse().map_err(|_| invalid())?;
        let scale = unit_nanos(unit.as_str()).ok_or_else(invalid)?;
        total_nanos += number * scale;
    }
    if consumed == 0 || consumed != body.len() {
        return Err(invalid());
    }

    let millis = (total_nanos / 1e6).trunc() as i64;
    Ok(if negative { -millis } else { millis })
}

/// Duration string or `default_ms` when empty.
pub fn parse_duration_or(input: &str, default_ms: i64) -> Result<i64> {
    if input.trim().is_empty() {
        return Ok(default_ms);
    }
    parse_duration_ms(input)
}
