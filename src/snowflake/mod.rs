use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;


/// Service epoch (2015-01-01T00:00:00Z) in unix milliseconds.
pub const SERVICE_EPOCH_MS: i64 = 1_420_070_400_000;

const TIMESTAMP_SHIFT: u32 = 22;
const MAX_TIMESTAMP_MS: u64 = (1_u64 << (64 - TIMESTAMP_SHIFT)) - 1;

/// Snowflake is a 64-bit time-ordered identifier.
///
/// Layout, most significant bits first:
/// - 42 bits: milliseconds since [`SERVICE_EPOCH_MS`]
/// - 5 bits: internal worker id
/// - 5 bits: internal process id
/// - 12 bits: per-process increment
///
/// Ordering by raw value is ordering by creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snowflake(u64);

impl Snowflake {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw integer value
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Creation instant encoded in the top 42 bits
    pub fn created_at(self) -> DateTime<Utc> {
        let millis = SERVICE_EPOCH_MS + (self.0 >> TIMESTAMP_SHIFT) as i64;
        // 42 bits of milliseconds past 2015 always fits chrono's range
        DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub const fn internal_worker_id(self) -> u8 {
        ((self.0 >> 17) & 0x1F) as u8
    }

    pub const fn internal_process_id(self) -> u8 {
        ((self.0 >> 12) & 0x1F) as u8
    }

    /// Sequence number within the same millisecond
    pub const fn increment(self) -> u16 {
        (self.0 & 0xFFF) as u16
    }

    /// Smallest snowflake that could have been created at `instant`.
    ///
    /// Instants before the service epoch clamp to zero, instants past the
    /// 42-bit range clamp to the last representable millisecond.
    pub fn from_created_at(instant: DateTime<Utc>) -> Self {
        let millis = (instant.timestamp_millis() - SERVICE_EPOCH_MS).max(0) as u64;
        Self(millis.min(MAX_TIMESTAMP_MS) << TIMESTAMP_SHIFT)
    }
}

impl From<u64> for Snowflake {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<Snowflake> for u64 {
    fn from(id: Snowflake) -> Self {
        id.0
    }
}

impl TryFrom<i64> for Snowflake {
    type Error = Error;

    fn try_from(raw: i64) -> Result<Self> {
        u64::try_from(raw)
            .map(Self)
            .map_err(|_| Error::InvalidIdentity(format!("{raw} is negative")))
    }
}

impl FromStr for Snowflake {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<u64>()
            .map(Self)
            .map_err(|e| Error::InvalidIdentity(format!("'{s}': {e}")))
    }
}

impl TryFrom<&Value> for Snowflake {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => s.parse(),
            Value::Number(n) => n
                .as_u64()
                .map(Self)
                .ok_or_else(|| Error::InvalidIdentity(format!("{n} is not an unsigned 64-bit integer"))),
            other => Err(Error::InvalidIdentity(format!("unexpected JSON value {other}"))),
        }
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// The gateway sends snowflakes as decimal strings to survive JSON number precision loss.
impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

struct SnowflakeVisitor;

impl<'de> Visitor<'de> for SnowflakeVisitor {
    type Value = Snowflake;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a snowflake as a decimal string or unsigned integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Snowflake, E> {
        Ok(Snowflake(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Snowflake, E> {
        Snowflake::try_from(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Snowflake, E> {
        v.parse().map_err(E::custom)
    }
}
