// src/config/duration.rs
//! Duration strings in the `1h30m`, `10s`, `250ms` form.

use anyhow::{anyhow, bail, Result};
use std::time::Duration;

const UNITS: &[(&str, f64)] = &[
    ("ns", 1e-9),
    ("us", 1e-6),
    ("µs", 1e-6),
    ("μs", 1e-6),
    ("ms", 1e-3),
    ("s", 1.0),
    ("m", 60.0),
    ("h", 3600.0),
];

/// Parse a sequence of decimal numbers, each with a unit suffix.
/// A bare `0` is accepted; negative values are not.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        bail!("empty duration");
    }
    let s = s.strip_prefix('+').unwrap_or(s);
    if s.starts_with('-') {
        bail!("negative duration {input:?}");
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut rest = s;
    let mut secs = 0.0f64;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            bail!("invalid duration {input:?}: expected number");
        }
        let value: f64 = rest[..num_len]
            .parse()
            .map_err(|_| anyhow!("invalid duration {input:?}: bad number"))?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        let factor = UNITS
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, f)| *f)
            .ok_or_else(|| {
                if unit.is_empty() {
                    anyhow!("invalid duration {input:?}: missing unit")
                } else {
                    anyhow!("invalid duration {input:?}: unknown unit {unit:?}")
                }
            })?;
        secs += value * factor;
        rest = &rest[unit_len..];
    }

    Duration::try_from_secs_f64(secs).map_err(|_| anyhow!("duration {input:?} out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_forms() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("5m0s").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "10", "-1s", "5 minutes", "h", "1x", "1.2.3s"] {
            assert!(parse_duration(bad).is_err(), "{bad:?} should fail");
        }
    }
}
