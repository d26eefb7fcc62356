//! Canonical forms used to compare rows across stores.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::core::value::SqlValue;

/// A timestamp as delivered by a store's driver.
///
/// SQLite returns timestamps as text with full precision, PostgreSQL returns
/// native temporal values. Records keep whichever they were given so the
/// migrated value is written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    Text(String),
    Date(NaiveDate),
    Naive(NaiveDateTime),
    Utc(DateTime<Utc>),
}

impl Timestamp {
    /// Interpret a column value as a timestamp.
    ///
    /// Text must parse as RFC 3339 or one of the SQLite renderings; it is kept
    /// verbatim once validated.
    pub fn from_value(value: SqlValue) -> Result<Self, String> {
        match value {
            SqlValue::Text(s) if is_timestamp_text(&s) => Ok(Timestamp::Text(s)),
            SqlValue::Text(s) => Err(format!("'{}' is not a timestamp", s)),
            SqlValue::Date(d) => Ok(Timestamp::Date(d)),
            SqlValue::DateTime(dt) => Ok(Timestamp::Naive(dt)),
            SqlValue::DateTimeTz(dt) => Ok(Timestamp::Utc(dt)),
            other => Err(format!("expected timestamp, got {}", other.type_name())),
        }
    }

    /// Value to bind when writing this timestamp.
    pub fn to_sql_value(&self) -> SqlValue {
        match self {
            Timestamp::Text(s) => SqlValue::Text(s.clone()),
            Timestamp::Date(d) => SqlValue::Date(*d),
            Timestamp::Naive(dt) => SqlValue::DateTime(*dt),
            Timestamp::Utc(dt) => SqlValue::DateTimeTz(*dt),
        }
    }
}

/// Accepted text renderings besides RFC 3339, most specific first.
const TEXT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

fn is_timestamp_text(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || DateTime::parse_from_str(s, TEXT_FORMATS[0]).is_ok()
        || TEXT_FORMATS[1..]
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(s, fmt).is_ok())
        || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Normalize a timestamp to `YYYY-MM-DD`, discarding time of day.
///
/// Native values are formatted; text values keep their first ten characters,
/// which is the date part of every ISO-8601 style rendering SQLite stores.
pub fn to_canonical_date(value: &Timestamp) -> String {
    match value {
        Timestamp::Text(s) => s.chars().take(10).collect(),
        Timestamp::Date(d) => d.format("%Y-%m-%d").to_string(),
        Timestamp::Naive(dt) => dt.format("%Y-%m-%d").to_string(),
        Timestamp::Utc(dt) => dt.format("%Y-%m-%d").to_string(),
    }
}

/// A record flattened to comparable text, in column declaration order.
///
/// `None` is NULL. Derived ordering makes a page sortable independent of the
/// physical order either store returned it in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CanonicalRow(pub Vec<Option<String>>);

impl CanonicalRow {
    /// The `id` column, always first.
    pub fn id(&self) -> Option<&str> {
        self.0.first().and_then(|v| v.as_deref())
    }

    /// Index of the first column that differs from `other`.
    pub fn first_difference(&self, other: &CanonicalRow) -> Option<usize> {
        let len = self.0.len().max(other.0.len());
        (0..len).find(|&i| self.0.get(i) != other.0.get(i))
    }
}
