//! Strict by-name binding of untyped rows.

use uuid::Uuid;

use super::canonical::Timestamp;
use super::{MappingError, MappingErrorKind};
use crate::core::schema::LogicalTable;
use crate::core::value::{Row, SqlValue};

/// Takes fields out of a row one by one; whatever is left at the end is an
/// unknown field.
pub(crate) struct FieldBinder {
    table: LogicalTable,
    row_id: Option<String>,
    fields: Vec<(String, SqlValue)>,
}

impl FieldBinder {
    pub(crate) fn new(table: LogicalTable, row: Row) -> Self {
        let row_id = row.get("id").and_then(SqlValue::to_text);
        Self {
            table,
            row_id,
            fields: row.into_fields(),
        }
    }

    fn error(&self, kind: MappingErrorKind) -> MappingError {
        MappingError {
            table: self.table,
            row_id: self.row_id.clone(),
            kind,
        }
    }

    fn invalid(&self, field: &str, reason: impl Into<String>) -> MappingError {
        self.error(MappingErrorKind::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        })
    }

    /// Remove a field, failing if the row does not carry it.
    fn take(&mut self, name: &str) -> Result<SqlValue, MappingError> {
        match self.fields.iter().position(|(n, _)| n == name) {
            Some(pos) => Ok(self.fields.swap_remove(pos).1),
            None => Err(self.error(MappingErrorKind::MissingField(name.to_string()))),
        }
    }

    fn take_non_null(&mut self, name: &str) -> Result<SqlValue, MappingError> {
        let value = self.take(name)?;
        if value.is_null() {
            return Err(self.invalid(name, "must not be null"));
        }
        Ok(value)
    }

    pub(crate) fn uuid(&mut self, name: &str) -> Result<Uuid, MappingError> {
        match self.take_non_null(name)? {
            SqlValue::Uuid(id) => Ok(id),
            SqlValue::Text(s) => {
                Uuid::parse_str(s.trim()).map_err(|e| self.invalid(name, format!("'{}': {}", s, e)))
            }
            other => Err(self.invalid(name, format!("expected uuid, got {}", other.type_name()))),
        }
    }

    pub(crate) fn text(&mut self, name: &str) -> Result<String, MappingError> {
        match self.take_non_null(name)? {
            SqlValue::Text(s) => Ok(s),
            other => Err(self.invalid(name, format!("expected text, got {}", other.type_name()))),
        }
    }

    pub(crate) fn opt_text(&mut self, name: &str) -> Result<Option<String>, MappingError> {
        match self.take(name)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s)),
            other => Err(self.invalid(name, format!("expected text, got {}", other.type_name()))),
        }
    }

    pub(crate) fn timestamp(&mut self, name: &str) -> Result<Timestamp, MappingError> {
        let value = self.take_non_null(name)?;
        Timestamp::from_value(value).map_err(|reason| self.invalid(name, reason))
    }

    pub(crate) fn opt_timestamp(&mut self, name: &str) -> Result<Option<Timestamp>, MappingError> {
        match self.take(name)? {
            SqlValue::Null => Ok(None),
            value => Timestamp::from_value(value)
                .map(Some)
                .map_err(|reason| self.invalid(name, reason)),
        }
    }

    /// A nullable real number. `default` applies only when the row does not
    /// carry the field at all; NULL stays NULL.
    pub(crate) fn opt_f64_or(&mut self, name: &str, default: f64) -> Result<Option<f64>, MappingError> {
        let value = match self.fields.iter().position(|(n, _)| n == name) {
            Some(pos) => self.fields.swap_remove(pos).1,
            None => return Ok(Some(default)),
        };
        match value {
            SqlValue::Null => Ok(None),
            SqlValue::F64(v) => Ok(Some(v)),
            SqlValue::I64(v) => Ok(Some(v as f64)),
            SqlValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.invalid(name, format!("'{}' is not a number", s))),
            other => Err(self.invalid(name, format!("expected number, got {}", other.type_name()))),
        }
    }

    /// Parse a required text field into an enumerated value.
    pub(crate) fn parse<T, F>(&mut self, name: &str, parse: F) -> Result<T, MappingError>
    where
        F: FnOnce(&str) -> Option<T>,
    {
        let raw = self.text(name)?;
        parse(&raw).ok_or_else(|| self.invalid(name, format!("unknown value '{}'", raw)))
    }

    /// Check a bound value against a predicate.
    pub(crate) fn ensure(&self, ok: bool, name: &str, reason: &str) -> Result<(), MappingError> {
        if ok {
            Ok(())
        } else {
            Err(self.invalid(name, reason))
        }
    }

    /// Fail if the row carried any field that was not bound.
    pub(crate) fn finish(self) -> Result<(), MappingError> {
        match self.fields.first() {
            Some((name, _)) => Err(self.error(MappingErrorKind::UnknownField(name.clone()))),
            None => Ok(()),
        }
    }
}
