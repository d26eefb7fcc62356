//! Identifier validation and quoting.
//!
//! Table, column and schema names cannot be bound as statement parameters, so
//! every identifier that reaches dynamic SQL goes through [`quote_ident`].
//! SQLite and PostgreSQL share the same double-quote quoting rules.

use crate::error::{MigrateError, Result};

/// PostgreSQL truncates identifiers longer than this many bytes.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier.
///
/// Rejects empty identifiers, identifiers containing null bytes, and
/// identifiers PostgreSQL would silently truncate.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier with double quotes, doubling embedded quotes.
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a table name with its schema: `"schema"."table"`.
pub fn qualify(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(table)?))
}

/// Quote and join a column list: `"a", "b", "c"`.
pub fn column_list<S: AsRef<str>>(columns: &[S]) -> Result<String> {
    let quoted = columns
        .iter()
        .map(|c| quote_ident(c.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("film_work").is_ok());
        assert!(validate_identifier("Genre").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        assert!(validate_identifier("genre\0; DROP TABLE genre").is_err());
    }

    #[test]
    fn test_validate_identifier_length_limit() {
        assert!(validate_identifier(&"a".repeat(63)).is_ok());
        assert!(validate_identifier(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_quote_ident_escapes_double_quote() {
        assert_eq!(quote_ident("genre").unwrap(), "\"genre\"");
        assert_eq!(quote_ident("gen\"re").unwrap(), "\"gen\"\"re\"");
    }

    #[test]
    fn test_quote_ident_injection_stays_inside_quotes() {
        let quoted = quote_ident("genre\"; DROP TABLE person; --").unwrap();
        assert_eq!(quoted, "\"genre\"\"; DROP TABLE person; --\"");
    }

    #[test]
    fn test_qualify() {
        assert_eq!(
            qualify("content", "film_work").unwrap(),
            "\"content\".\"film_work\""
        );
        assert!(qualify("", "film_work").is_err());
    }

    #[test]
    fn test_column_list() {
        assert_eq!(
            column_list(&["id", "name"]).unwrap(),
            "\"id\", \"name\""
        );
    }
}
