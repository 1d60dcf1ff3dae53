//! Key formats shared by the recorder, the curator, and the archiver.
//!
//! Daily markers look like `2024-3-5 login` (no zero padding), monthly
//! aggregates live under `2024-3`, consumer positions under `offset:<stream>`,
//! and log buckets are hour-truncated UTC timestamps.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use std::fmt;

/// Separator between the date part and the event name of a marker key.
pub const MARKER_SEPARATOR: char = ' ';

/// Value stored under every daily marker.
pub const MARKER_PRESENT: &str = "true";

/// A calendar month, the unit of curation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The month containing `now`.
    pub fn of(now: DateTime<Utc>) -> Self {
        Self::new(now.year(), now.month())
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    /// First instant of this month in UTC.
    pub fn start(self) -> Option<DateTime<Utc>> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    /// Key of the monthly aggregate, e.g. `2024-3`.
    pub fn aggregate_key(self) -> String {
        self.to_string()
    }

    /// Pattern matching every daily marker of this month, e.g. `2024-3-*`.
    pub fn marker_pattern(self) -> String {
        format!("{}-*", self)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.month)
    }
}

/// Builds the marker key for `event` happening on `date`.
pub fn marker_key(date: NaiveDate, event: &str) -> String {
    format!(
        "{}-{}-{}{}{}",
        date.year(),
        date.month(),
        date.day(),
        MARKER_SEPARATOR,
        event
    )
}

/// A well-formed daily marker key split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerKey<'a> {
    pub key: &'a str,
    pub day: u32,
    pub event: &'a str,
}

/// Parses a marker key.
///
/// Returns `None` unless splitting on the separator yields exactly two parts
/// and the date part ends in a numeric day.
pub fn parse_marker(key: &str) -> Option<MarkerKey<'_>> {
    let mut parts = key.split(MARKER_SEPARATOR);
    let date = parts.next()?;
    let event = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let day = date.rsplit('-').next()?.parse::<u32>().ok()?;
    Some(MarkerKey { key, day, event })
}

/// Prefix of saved consumer positions. Never matches a marker pattern.
pub const OFFSET_KEY_PREFIX: &str = "offset:";

/// Key holding the saved position of a consumer stream.
pub fn consumer_offset_key(stream: &str) -> String {
    format!("{}{}", OFFSET_KEY_PREFIX, stream)
}

/// Hour bucket key for the log archive, e.g. `2024-03-05 14:00:00 UTC`.
pub fn hour_bucket(now: DateTime<Utc>) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:00:00 UTC",
        now.year(),
        now.month(),
        now.day(),
        now.hour()
    )
}
