//! Sortable unique IDs
//!
//! A sortable unique ID is a 30-digit string: 19 zero-padded digits of
//! 100-nanosecond ticks since 0001-01-01T00:00:00Z, followed by 11 digits
//! derived from a UUID. Ordinal string comparison therefore equals
//! chronological order, with the UUID digits breaking ties inside one tick.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const TICK_DIGITS: usize = 19;
const RANDOM_DIGITS: usize = 11;
const ID_LENGTH: usize = TICK_DIGITS + RANDOM_DIGITS;
const RANDOM_MODULUS: u128 = 100_000_000_000;

/// Ticks between 0001-01-01 and the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Errors produced when decoding a sortable unique ID
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortableIdError {
    #[error("sortable id must be {ID_LENGTH} characters, got {0}")]
    InvalidLength(usize),
    #[error("sortable id contains non-digit characters: {0}")]
    NonDigit(String),
    #[error("sortable id timestamp out of range: {0}")]
    OutOfRange(String),
}

/// A validated sortable unique ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortableUniqueId(String);

impl SortableUniqueId {
    /// Parse and validate an ID string
    pub fn parse(value: impl Into<String>) -> Result<Self, SortableIdError> {
        let value = value.into();
        if value.len() != ID_LENGTH {
            return Err(SortableIdError::InvalidLength(value.len()));
        }
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SortableIdError::NonDigit(value));
        }
        Ok(Self(value))
    }

    /// Generate the ID for an event occurring at `time`, tie-broken by `id`
    pub fn generate(time: DateTime<Utc>, id: Uuid) -> Self {
        let random = id.as_u128() % RANDOM_MODULUS;
        Self(format!(
            "{:0tw$}{:0rw$}",
            to_ticks(time),
            random,
            tw = TICK_DIGITS,
            rw = RANDOM_DIGITS
        ))
    }

    /// Generate an ID for "now" with a fresh random tie-break
    pub fn now() -> Self {
        Self::generate(Utc::now(), Uuid::new_v4())
    }

    /// Smallest possible ID at `time` (all-zero tie-break)
    pub fn min_for(time: DateTime<Utc>) -> Self {
        Self::generate(time, Uuid::nil())
    }

    /// Raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Decode the timestamp part
    pub fn date_time(&self) -> Result<DateTime<Utc>, SortableIdError> {
        let ticks: i64 = self.0[..TICK_DIGITS]
            .parse()
            .map_err(|_| SortableIdError::OutOfRange(self.0.clone()))?;
        from_ticks(ticks).ok_or_else(|| SortableIdError::OutOfRange(self.0.clone()))
    }

    pub fn is_later_than(&self, other: &SortableUniqueId) -> bool {
        self.0.as_str() > other.0.as_str()
    }

    pub fn is_earlier_than_or_equal(&self, other: &SortableUniqueId) -> bool {
        self.0.as_str() <= other.0.as_str()
    }
}

impl fmt::Display for SortableUniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SortableUniqueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordinal comparison of two raw ID strings
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}

/// Decode the timestamp of a raw ID string
pub fn timestamp_of(value: &str) -> Result<DateTime<Utc>, SortableIdError> {
    SortableUniqueId::parse(value)?.date_time()
}

fn to_ticks(time: DateTime<Utc>) -> i64 {
    UNIX_EPOCH_TICKS
        + time.timestamp() * TICKS_PER_SECOND
        + i64::from(time.timestamp_subsec_nanos() / 100)
}

fn from_ticks(ticks: i64) -> Option<DateTime<Utc>> {
    let unix_ticks = ticks.checked_sub(UNIX_EPOCH_TICKS)?;
    let secs = unix_ticks.div_euclid(TICKS_PER_SECOND);
    let nanos = (unix_ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}
