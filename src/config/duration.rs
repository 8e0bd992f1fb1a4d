//! Serde helpers for human-readable durations.
//!
//! Durations are written as `humantime` strings (`"1500ms"`, `"2s 500ms"`)
//! or as bare integers, which are read as milliseconds.

use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serializer};

use crate::error::ConfigError;

/// Parses a duration string.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidDuration`] if `s` is not a valid
/// `humantime` duration.
pub fn parse(s: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(s.trim()).map_err(|e| ConfigError::InvalidDuration {
        value: s.to_string(),
        message: e.to_string(),
    })
}

/// Serializes a duration as a `humantime` string.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Millis(u64),
    Text(String),
}

/// Deserializes a duration from a string or a millisecond count.
///
/// # Errors
///
/// Returns a deserializer error if the string is not a valid duration.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match Raw::deserialize(deserializer)? {
        Raw::Millis(ms) => Ok(Duration::from_millis(ms)),
        Raw::Text(s) => parse(&s).map_err(de::Error::custom),
    }
}
