//! Duration strings as used by the deployment environment: an integer
//! followed by `ms`, `s`, `m` or `h`. A bare integer is read as seconds.

use crate::errors::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| Error::Config(format!("Invalid duration `{raw}`")))?;

    let seconds_per_unit = match unit.trim() {
        "ms" => return Ok(Duration::from_millis(value)),
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        other => {
            return Err(Error::Config(format!(
                "Invalid duration unit `{other}` in `{raw}`"
            )));
        }
    };
    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::Config(format!("Duration `{raw}` is too large")))
}

/// For `#[serde(deserialize_with = "...")]` on `Duration` fields.
pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}
