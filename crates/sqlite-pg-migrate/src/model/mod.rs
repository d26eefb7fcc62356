//! Row mapping between untyped store rows and typed catalog records.
//!
//! Every row read from either store goes through [`map_row`]. Mapping is
//! strict: each declared column must be present by name, no undeclared
//! column may appear, and enumerated fields must hold a known value.

mod binder;
mod canonical;
mod records;

use thiserror::Error;
use uuid::Uuid;

use crate::core::schema::LogicalTable;
use crate::core::value::{Row, SqlValue};

pub use canonical::{to_canonical_date, CanonicalRow, Timestamp};
pub use records::{FilmWork, FilmWorkType, Genre, GenreFilmWork, Person, PersonFilmWork, PersonRole};

/// Why a single row could not be mapped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MappingErrorKind {
    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// A row that does not fit its table's record shape.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{table} row {}: {kind}", .row_id.as_deref().unwrap_or("<unknown id>"))]
pub struct MappingError {
    pub table: LogicalTable,
    pub row_id: Option<String>,
    pub kind: MappingErrorKind,
}

/// A typed record of one logical table.
pub trait Record: Sized {
    const TABLE: LogicalTable;

    /// Bind a name-keyed row to this record.
    fn from_row(row: Row) -> Result<Self, MappingError>;

    fn id(&self) -> Uuid;

    /// Column values in the table's declared column order.
    fn values(&self) -> Vec<SqlValue>;

    /// Comparable form, in the table's declared column order.
    fn canonical(&self) -> CanonicalRow;
}

/// A record of any of the five tables.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyRecord {
    Genre(Genre),
    FilmWork(FilmWork),
    Person(Person),
    PersonFilmWork(PersonFilmWork),
    GenreFilmWork(GenreFilmWork),
}

macro_rules! dispatch {
    ($self:expr, $r:ident => $body:expr) => {
        match $self {
            AnyRecord::Genre($r) => $body,
            AnyRecord::FilmWork($r) => $body,
            AnyRecord::Person($r) => $body,
            AnyRecord::PersonFilmWork($r) => $body,
            AnyRecord::GenreFilmWork($r) => $body,
        }
    };
}

impl AnyRecord {
    pub fn table(&self) -> LogicalTable {
        match self {
            AnyRecord::Genre(_) => Genre::TABLE,
            AnyRecord::FilmWork(_) => FilmWork::TABLE,
            AnyRecord::Person(_) => Person::TABLE,
            AnyRecord::PersonFilmWork(_) => PersonFilmWork::TABLE,
            AnyRecord::GenreFilmWork(_) => GenreFilmWork::TABLE,
        }
    }

    pub fn id(&self) -> Uuid {
        dispatch!(self, r => r.id())
    }

    pub fn values(&self) -> Vec<SqlValue> {
        dispatch!(self, r => r.values())
    }

    pub fn canonical(&self) -> CanonicalRow {
        dispatch!(self, r => r.canonical())
    }
}

/// Map a row read from `table` into its typed record.
pub fn map_row(table: LogicalTable, row: Row) -> Result<AnyRecord, MappingError> {
    Ok(match table {
        LogicalTable::Genre => AnyRecord::Genre(Genre::from_row(row)?),
        LogicalTable::FilmWork => AnyRecord::FilmWork(FilmWork::from_row(row)?),
        LogicalTable::Person => AnyRecord::Person(Person::from_row(row)?),
        LogicalTable::PersonFilmWork => AnyRecord::PersonFilmWork(PersonFilmWork::from_row(row)?),
        LogicalTable::GenreFilmWork => AnyRecord::GenreFilmWork(GenreFilmWork::from_row(row)?),
    })
}
