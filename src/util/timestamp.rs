//! Serde helpers for timestamps.
//!
//! Values are written as BSON datetimes when the serializer is a store
//! serializer and as RFC 3339 strings for JSON. On read both a BSON datetime
//! and an ISO-8601 string are accepted, so documents written by older clients
//! that stored strings are normalized the next time they are saved.

use bson::Bson;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if serializer.is_human_readable() {
        serializer.serialize_str(&value.to_rfc3339())
    } else {
        bson::DateTime::from_chrono(*value).serialize(serializer)
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Bson::deserialize(deserializer)?;
    from_bson(raw).map_err(serde::de::Error::custom)
}

pub fn from_bson(raw: Bson) -> Result<DateTime<Utc>, String> {
    match raw {
        Bson::DateTime(dt) => Ok(dt.to_chrono()),
        Bson::String(s) => parse_iso8601(&s),
        other => Err(format!(
            "expected a datetime or an ISO-8601 string, found {:?}",
            other.element_type()
        )),
    }
}

/// Parses RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.f]` (taken as UTC) or a bare date.
pub fn parse_iso8601(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }
    Err(format!("invalid ISO-8601 timestamp: '{}'", value))
}

pub mod option {
    use super::*;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => super::serialize(dt, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Bson>::deserialize(deserializer)? {
            None | Some(Bson::Null) => Ok(None),
            Some(raw) => from_bson(raw).map(Some).map_err(serde::de::Error::custom),
        }
    }
}
