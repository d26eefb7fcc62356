//! The fixed catalog of logical tables this pipeline migrates.
//!
//! Column order here is the single source of truth for record field order,
//! insert column lists and flattened value tuples.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Column definition for a logical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name, identical in both stores.
    pub name: &'static str,
    /// PostgreSQL type used to cast bound text parameters.
    pub pg_type: &'static str,
    /// Whether NULL is allowed.
    pub is_nullable: bool,
}

const fn col(name: &'static str, pg_type: &'static str, is_nullable: bool) -> ColumnDef {
    ColumnDef {
        name,
        pg_type,
        is_nullable,
    }
}

const GENRE_COLUMNS: &[ColumnDef] = &[
    col("id", "uuid", false),
    col("name", "text", false),
    col("description", "text", true),
    col("created_at", "timestamptz", false),
    col("updated_at", "timestamptz", false),
];

const FILM_WORK_COLUMNS: &[ColumnDef] = &[
    col("id", "uuid", false),
    col("title", "text", false),
    col("type", "text", false),
    col("description", "text", true),
    col("creation_date", "date", true),
    col("file_path", "text", true),
    col("rating", "double precision", true),
    col("created_at", "timestamptz", false),
    col("updated_at", "timestamptz", false),
];

const PERSON_COLUMNS: &[ColumnDef] = &[
    col("id", "uuid", false),
    col("full_name", "text", false),
    col("created_at", "timestamptz", false),
    col("updated_at", "timestamptz", false),
];

const PERSON_FILM_WORK_COLUMNS: &[ColumnDef] = &[
    col("id", "uuid", false),
    col("film_work_id", "uuid", false),
    col("person_id", "uuid", false),
    col("role", "text", false),
    col("created_at", "timestamptz", false),
];

const GENRE_FILM_WORK_COLUMNS: &[ColumnDef] = &[
    col("id", "uuid", false),
    col("film_work_id", "uuid", false),
    col("genre_id", "uuid", false),
    col("created_at", "timestamptz", false),
];

/// One of the five migrated tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalTable {
    Genre,
    FilmWork,
    Person,
    PersonFilmWork,
    GenreFilmWork,
}

impl LogicalTable {
    /// Tables in the order they are migrated and verified.
    pub const MIGRATION_ORDER: [LogicalTable; 5] = [
        LogicalTable::Genre,
        LogicalTable::FilmWork,
        LogicalTable::Person,
        LogicalTable::PersonFilmWork,
        LogicalTable::GenreFilmWork,
    ];

    /// Table name in both stores.
    pub fn name(&self) -> &'static str {
        match self {
            LogicalTable::Genre => "genre",
            LogicalTable::FilmWork => "film_work",
            LogicalTable::Person => "person",
            LogicalTable::PersonFilmWork => "person_film_work",
            LogicalTable::GenreFilmWork => "genre_film_work",
        }
    }

    /// Column definitions in declaration order.
    pub fn columns(&self) -> &'static [ColumnDef] {
        match self {
            LogicalTable::Genre => GENRE_COLUMNS,
            LogicalTable::FilmWork => FILM_WORK_COLUMNS,
            LogicalTable::Person => PERSON_COLUMNS,
            LogicalTable::PersonFilmWork => PERSON_FILM_WORK_COLUMNS,
            LogicalTable::GenreFilmWork => GENRE_FILM_WORK_COLUMNS,
        }
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns().iter().map(|c| c.name).collect()
    }

    /// Primary key column.
    pub fn primary_key(&self) -> &'static str {
        "id"
    }

    /// Look up a column definition by name.
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns().iter().find(|c| c.name == name)
    }

    /// Unique constraints the target enforces, primary key first.
    pub fn unique_keys(&self) -> &'static [&'static [&'static str]] {
        match self {
            LogicalTable::Genre => &[&["id"], &["name"]],
            LogicalTable::FilmWork => &[&["id"]],
            LogicalTable::Person => &[&["id"], &["full_name"]],
            LogicalTable::PersonFilmWork => &[&["id"], &["film_work_id", "person_id", "role"]],
            LogicalTable::GenreFilmWork => &[&["id"], &["film_work_id", "genre_id"]],
        }
    }
}

impl fmt::Display for LogicalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_order() {
        let names: Vec<_> = LogicalTable::MIGRATION_ORDER
            .iter()
            .map(|t| t.name())
            .collect();
        assert_eq!(
            names,
            vec!["genre", "film_work", "person", "person_film_work", "genre_film_work"]
        );
    }

    #[test]
    fn test_every_table_starts_with_id() {
        for table in LogicalTable::MIGRATION_ORDER {
            assert_eq!(table.columns()[0].name, table.primary_key());
            assert_eq!(table.columns()[0].pg_type, "uuid");
        }
    }

    #[test]
    fn test_column_lookup() {
        let rating = LogicalTable::FilmWork.column("rating").unwrap();
        assert_eq!(rating.pg_type, "double precision");
        assert!(LogicalTable::Person.column("rating").is_none());
    }

    #[test]
    fn test_unique_keys_name_declared_columns() {
        for table in LogicalTable::MIGRATION_ORDER {
            assert_eq!(table.unique_keys()[0], &["id"]);
            for key in table.unique_keys() {
                for col in key.iter() {
                    assert!(table.column(col).is_some(), "{}.{}", table, col);
                }
            }
        }
    }
}
