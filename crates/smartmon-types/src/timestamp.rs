//! Timestamp decoding for sensor rows.
//!
//! The device backend stores rows with a SQL `DATETIME DEFAULT CURRENT_TIMESTAMP`
//! column, while other deployments send epoch milliseconds. Every accepted
//! representation is normalized to epoch milliseconds (UTC).

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::{ParseError, ParseResult};

/// Parse a textual timestamp into epoch milliseconds.
///
/// Accepted forms:
/// - decimal epoch milliseconds (`"1700000000000"`)
/// - SQL datetime, interpreted as UTC (`"2024-05-01 14:03:22"`, optional fraction)
/// - RFC 3339 (`"2024-05-01T14:03:22Z"`)
///
/// # Examples
///
/// ```
/// use smartmon_types::timestamp::parse_timestamp;
///
/// assert_eq!(parse_timestamp("1970-01-01 00:00:01").unwrap(), 1_000);
/// assert_eq!(parse_timestamp("1970-01-01T00:00:02Z").unwrap(), 2_000);
/// assert_eq!(parse_timestamp("3000").unwrap(), 3_000);
/// assert!(parse_timestamp("yesterday").is_err());
/// ```
pub fn parse_timestamp(input: &str) -> ParseResult<i64> {
    let trimmed = input.trim();

    if let Ok(millis) = trimmed.parse::<i64>() {
        return Ok(millis);
    }

    let sql = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    if let Ok(dt) = PrimitiveDateTime::parse(trimmed, sql) {
        return Ok(to_millis(dt.assume_utc()));
    }

    if let Ok(dt) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(to_millis(dt));
    }

    Err(ParseError::InvalidTimestamp(input.to_string()))
}

fn to_millis(dt: OffsetDateTime) -> i64 {
    (dt.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Serde adapter for epoch-millisecond timestamps that may arrive as numbers
/// or strings. Always serializes as an integer.
#[cfg(feature = "serde")]
pub mod epoch_millis {
    use core::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        deserializer.deserialize_any(MillisVisitor)
    }

    struct MillisVisitor;

    impl Visitor<'_> for MillisVisitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("epoch milliseconds or a datetime string")
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::custom(format!("timestamp {v} out of range")))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
            if v.is_finite() && v.abs() < i64::MAX as f64 {
                Ok(v as i64)
            } else {
                Err(E::custom(format!("timestamp {v} out of range")))
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
            super::parse_timestamp(v).map_err(E::custom)
        }
    }
}
