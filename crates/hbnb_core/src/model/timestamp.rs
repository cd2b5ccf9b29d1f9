//! Fixed textual timestamp form used by persisted records.
//!
//! Timestamps are naive UTC wall times with microsecond precision, written as
//! `2020-01-01T00:00:00.000000`.

use chrono::{NaiveDateTime, ParseError, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Format used when writing timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

const SPACE_SEPARATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Current UTC time, truncated to the precision of [`TIMESTAMP_FORMAT`].
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(6)
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a persisted timestamp.
///
/// Accepts the fixed form, the same form without fractional seconds, and a
/// space in place of the `T` separator.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, ParseError> {
    let trimmed = value.trim();
    trimmed
        .parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, SPACE_SEPARATED_FORMAT))
}

pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse_timestamp(&text).map_err(|err| {
        serde::de::Error::custom(format!("invalid timestamp `{text}`: {err}"))
    })
}

/// serde adapter for optional timestamps.
pub mod option {
    use super::parse_timestamp;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => parse_timestamp(&text).map(Some).map_err(|err| {
                serde::de::Error::custom(format!("invalid timestamp `{text}`: {err}"))
            }),
            None => Ok(None),
        }
    }
}
