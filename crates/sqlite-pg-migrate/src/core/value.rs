//! SQL value and row types shared by the readers, writers and the row mapper.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

/// A single column value as produced by either store's driver.
///
/// SQLite hands back dynamically typed values (text timestamps, integer or
/// real numbers), PostgreSQL hands back native types. Both land here so the
/// row mapper only has one representation to bind from.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// 64-bit signed integer.
    I64(i64),

    /// 64-bit floating point.
    F64(f64),

    /// Text value.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// UUID.
    Uuid(Uuid),

    /// Date without time.
    Date(NaiveDate),

    /// Timestamp without time zone.
    DateTime(NaiveDateTime),

    /// Timestamp with time zone, normalized to UTC.
    DateTimeTz(DateTime<Utc>),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short type label used in mapping error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::I64(_) => "integer",
            SqlValue::F64(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Uuid(_) => "uuid",
            SqlValue::Date(_) => "date",
            SqlValue::DateTime(_) => "timestamp",
            SqlValue::DateTimeTz(_) => "timestamptz",
        }
    }

    /// Render the value as PostgreSQL input text, `None` for NULL.
    ///
    /// Bulk inserts bind every parameter as text and cast it server-side, so
    /// this must produce literals PostgreSQL accepts for the column type.
    pub fn to_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(v) => Some(v.to_string()),
            SqlValue::I64(v) => Some(v.to_string()),
            SqlValue::F64(v) => Some(v.to_string()),
            SqlValue::Text(v) => Some(v.clone()),
            SqlValue::Bytes(v) => {
                let mut hex = String::with_capacity(2 + v.len() * 2);
                hex.push_str("\\x");
                for b in v {
                    hex.push_str(&format!("{:02x}", b));
                }
                Some(hex)
            }
            SqlValue::Uuid(v) => Some(v.to_string()),
            SqlValue::Date(v) => Some(v.format("%Y-%m-%d").to_string()),
            SqlValue::DateTime(v) => Some(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            SqlValue::DateTimeTz(v) => Some(v.to_rfc3339()),
        }
    }
}

/// A row whose values are addressed by column name.
///
/// Column order is preserved as returned by the driver, but nothing
/// downstream depends on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, SqlValue)>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty row with room for `n` columns.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            fields: Vec::with_capacity(n),
        }
    }

    /// Append a column value.
    pub fn push(&mut self, name: impl Into<String>, value: SqlValue) {
        self.fields.push((name.into(), value));
    }

    /// Builder-style append.
    pub fn with(mut self, name: impl Into<String>, value: SqlValue) -> Self {
        self.push(name, value);
        self
    }

    /// Look up a value by column name.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Column names in driver order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Consume the row into its `(name, value)` pairs.
    pub fn into_fields(self) -> Vec<(String, SqlValue)> {
        self.fields
    }
}

impl FromIterator<(String, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A page of rows read from one table.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Rows in this batch (owned for channel transfer).
    pub rows: Vec<Row>,
}

impl Batch {
    /// Create a new batch with the given rows.
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Get the number of rows in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_by_name() {
        let row = Row::new()
            .with("id", SqlValue::Text("abc".into()))
            .with("name", SqlValue::Null);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some(&SqlValue::Text("abc".into())));
        assert_eq!(row.get("name"), Some(&SqlValue::Null));
        assert!(row.get("missing").is_none());
        assert_eq!(row.names().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[test]
    fn test_to_text_null() {
        assert_eq!(SqlValue::Null.to_text(), None);
    }

    #[test]
    fn test_to_text_temporal() {
        let dt = NaiveDate::from_ymd_opt(2021, 6, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(
            SqlValue::DateTime(dt).to_text().as_deref(),
            Some("2021-06-15 10:30:00")
        );
        assert_eq!(
            SqlValue::DateTimeTz(dt.and_utc()).to_text().as_deref(),
            Some("2021-06-15T10:30:00+00:00")
        );
        assert_eq!(
            SqlValue::Date(dt.date()).to_text().as_deref(),
            Some("2021-06-15")
        );
    }

    #[test]
    fn test_to_text_bytes_hex() {
        assert_eq!(
            SqlValue::Bytes(vec![0x00, 0xab]).to_text().as_deref(),
            Some("\\x00ab")
        );
    }

    #[test]
    fn test_batch_len() {
        let batch = Batch::new(vec![Row::new(), Row::new()]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert!(Batch::default().is_empty());
    }
}
