//! The reader's local wall-clock timestamp.
//!
//! The simulated device stamps every tag read with its local time rendered
//! as `D/M/YYYY H:M:S:mmm`: day, month, hour, minute and second are not
//! zero-padded, milliseconds always take three digits. For example
//! `7/3/2025 9:5:2:043`.

use core::fmt;
use core::str::FromStr;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

const NANOS_PER_MILLI: u32 = 1_000_000;
const MAX_MILLIS: u32 = 999;

/// Errors produced when parsing a [`ReadTimestamp`] from its wire form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampParseError {
    /// The string does not have the `D/M/YYYY H:M:S:mmm` shape.
    #[error("malformed timestamp {input:?}: {reason}")]
    Malformed {
        /// The rejected input.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// All components parsed but do not name a real date-time.
    #[error("timestamp {input:?} is out of range")]
    OutOfRange {
        /// The rejected input.
        input: String,
    },
}

/// Local date-time with millisecond precision.
///
/// Sub-millisecond precision is discarded at construction so that a value
/// survives a trip through its wire form unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReadTimestamp(NaiveDateTime);

impl ReadTimestamp {
    /// Capture the current local time.
    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }

    /// Wrap a naive local date-time, truncating it to whole milliseconds.
    pub fn from_naive(at: NaiveDateTime) -> Self {
        let millis = millis_of(at);
        let truncated = at
            .with_nanosecond(millis.saturating_mul(NANOS_PER_MILLI))
            .unwrap_or(at);
        Self(truncated)
    }

    /// Return the wrapped date-time.
    pub const fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Millisecond component (0-999).
    pub fn millisecond(&self) -> u32 {
        millis_of(self.0)
    }
}

/// Millisecond part of `at`, folding a leap second into 999.
fn millis_of(at: NaiveDateTime) -> u32 {
    at.nanosecond()
        .checked_div(NANOS_PER_MILLI)
        .unwrap_or(0)
        .min(MAX_MILLIS)
}

impl fmt::Display for ReadTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self.0;
        write!(
            f,
            "{}/{}/{} {}:{}:{}:{:03}",
            at.day(),
            at.month(),
            at.year(),
            at.hour(),
            at.minute(),
            at.second(),
            self.millisecond(),
        )
    }
}

impl FromStr for ReadTimestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: String| TimestampParseError::Malformed {
            input: s.to_owned(),
            reason,
        };

        let (date, time) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| malformed("missing space between date and time".to_owned()))?;

        let date_parts: Vec<&str> = date.split('/').collect();
        let &[day, month, year] = date_parts.as_slice() else {
            return Err(malformed("date must be D/M/YYYY".to_owned()));
        };

        let time_parts: Vec<&str> = time.split(':').collect();
        let &[hour, minute, second, millis] = time_parts.as_slice() else {
            return Err(malformed("time must be H:M:S:mmm".to_owned()));
        };
        if millis.is_empty() || millis.len() > 3 {
            return Err(malformed("milliseconds must have one to three digits".to_owned()));
        }

        let number = |part: &str| -> Result<u32, TimestampParseError> {
            part.parse::<u32>()
                .map_err(|e| malformed(format!("invalid component {part:?}: {e}")))
        };
        let year = year
            .parse::<i32>()
            .map_err(|e| malformed(format!("invalid year {year:?}: {e}")))?;
        let (month, day) = (number(month)?, number(day)?);
        let (hour, minute, second, millis) =
            (number(hour)?, number(minute)?, number(second)?, number(millis)?);

        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_milli_opt(hour, minute, second, millis))
            .map(Self)
            .ok_or_else(|| TimestampParseError::OutOfRange {
                input: s.to_owned(),
            })
    }
}

impl Serialize for ReadTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReadTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
