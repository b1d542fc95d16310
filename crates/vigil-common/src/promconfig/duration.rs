//! Collector duration strings
//!
//! A duration is a sequence of `<integer><unit>` pairs with units in strictly
//! decreasing order: `y`, `w`, `d`, `h`, `m`, `s`, `ms` (e.g. `1h30m`, `90s`,
//! `500ms`). A bare `0` is accepted. A year is 365 days.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::ConfigError;

const MILLIS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

const UNITS: [(&str, u64); 7] = [
    ("y", 365 * MILLIS_PER_DAY),
    ("w", 7 * MILLIS_PER_DAY),
    ("d", MILLIS_PER_DAY),
    ("h", 60 * 60 * 1000),
    ("m", 60 * 1000),
    ("s", 1000),
    ("ms", 1),
];

/// A duration in the collector's notation, stored with millisecond precision
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PromDuration(u64);

impl PromDuration {
    /// Create a duration from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Create a duration from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1000)
    }

    /// Length in milliseconds
    pub const fn as_millis(&self) -> u64 {
        self.0
    }
}

impl FromStr for PromDuration {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ConfigError::duration(s, "empty duration string"));
        }
        if s == "0" {
            return Ok(Self(0));
        }

        let invalid = || ConfigError::duration(s, "not a valid duration string");
        let bytes = s.as_bytes();
        let mut pos = 0;
        let mut next_unit = 0;
        let mut total: u64 = 0;

        while pos < bytes.len() {
            let digits_start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            if digits_start == pos {
                return Err(invalid());
            }
            let value: u64 = s[digits_start..pos].parse().map_err(|_| invalid())?;

            let unit_start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
                pos += 1;
            }
            let unit = &s[unit_start..pos];

            // Units may appear at most once each and only in decreasing order.
            let offset = UNITS[next_unit..]
                .iter()
                .position(|(u, _)| *u == unit)
                .ok_or_else(invalid)?;
            let (_, multiplier) = UNITS[next_unit + offset];
            next_unit += offset + 1;

            total = value
                .checked_mul(multiplier)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(|| ConfigError::duration(s, "duration out of range"))?;
        }

        Ok(Self(total))
    }
}

impl fmt::Display for PromDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut millis = self.0;
        if millis == 0 {
            return f.write_str("0s");
        }
        for (index, (unit, multiplier)) in UNITS.iter().enumerate() {
            // Years and weeks are only used when they divide evenly: 90d reads
            // better than 12w6d.
            if index < 2 && millis % multiplier != 0 {
                continue;
            }
            let value = millis / multiplier;
            if value > 0 {
                write!(f, "{value}{unit}")?;
                millis -= value * multiplier;
            }
        }
        Ok(())
    }
}

impl Serialize for PromDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PromDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
