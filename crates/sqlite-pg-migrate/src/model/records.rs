//! Typed records for the five logical tables.

use std::fmt;

use uuid::Uuid;

use super::binder::FieldBinder;
use super::canonical::{to_canonical_date, CanonicalRow, Timestamp};
use super::{MappingError, Record};
use crate::core::schema::LogicalTable;
use crate::core::value::{Row, SqlValue};

/// Film work kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilmWorkType {
    Movie,
    TvShow,
}

impl FilmWorkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilmWorkType::Movie => "movie",
            FilmWorkType::TvShow => "tv_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(FilmWorkType::Movie),
            "tv_show" => Some(FilmWorkType::TvShow),
            _ => None,
        }
    }
}

/// Role of a person in a film work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonRole {
    Director,
    Actor,
    Writer,
}

impl PersonRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonRole::Director => "director",
            PersonRole::Actor => "actor",
            PersonRole::Writer => "writer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "director" => Some(PersonRole::Director),
            "actor" => Some(PersonRole::Actor),
            "writer" => Some(PersonRole::Writer),
            _ => None,
        }
    }
}

impl fmt::Display for FilmWorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PersonRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn text(s: &str) -> SqlValue {
    SqlValue::Text(s.to_string())
}

fn opt_text(s: &Option<String>) -> SqlValue {
    s.as_deref().map(text).unwrap_or(SqlValue::Null)
}

fn opt_timestamp(ts: &Option<Timestamp>) -> SqlValue {
    ts.as_ref().map(Timestamp::to_sql_value).unwrap_or(SqlValue::Null)
}

fn canon_date(ts: &Timestamp) -> Option<String> {
    Some(to_canonical_date(ts))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Record for Genre {
    const TABLE: LogicalTable = LogicalTable::Genre;

    fn from_row(row: Row) -> Result<Self, MappingError> {
        let mut b = FieldBinder::new(Self::TABLE, row);
        let record = Self {
            id: b.uuid("id")?,
            name: b.text("name")?,
            description: b.opt_text("description")?,
            created_at: b.timestamp("created_at")?,
            updated_at: b.timestamp("updated_at")?,
        };
        b.finish()?;
        Ok(record)
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            text(&self.name),
            opt_text(&self.description),
            self.created_at.to_sql_value(),
            self.updated_at.to_sql_value(),
        ]
    }

    fn canonical(&self) -> CanonicalRow {
        CanonicalRow(vec![
            Some(self.id.to_string()),
            Some(self.name.clone()),
            self.description.clone(),
            canon_date(&self.created_at),
            canon_date(&self.updated_at),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilmWork {
    pub id: Uuid,
    pub title: String,
    pub r#type: FilmWorkType,
    pub description: Option<String>,
    pub creation_date: Option<Timestamp>,
    pub file_path: Option<String>,
    pub rating: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Record for FilmWork {
    const TABLE: LogicalTable = LogicalTable::FilmWork;

    fn from_row(row: Row) -> Result<Self, MappingError> {
        let mut b = FieldBinder::new(Self::TABLE, row);
        let record = Self {
            id: b.uuid("id")?,
            title: b.text("title")?,
            r#type: b.parse("type", FilmWorkType::parse)?,
            description: b.opt_text("description")?,
            creation_date: b.opt_timestamp("creation_date")?,
            file_path: b.opt_text("file_path")?,
            rating: b.opt_f64_or("rating", 0.0)?,
            created_at: b.timestamp("created_at")?,
            updated_at: b.timestamp("updated_at")?,
        };
        b.ensure(
            record.rating.map_or(true, |r| (0.0..=100.0).contains(&r)),
            "rating",
            "must be between 0 and 100",
        )?;
        b.finish()?;
        Ok(record)
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            text(&self.title),
            text(self.r#type.as_str()),
            opt_text(&self.description),
            opt_timestamp(&self.creation_date),
            opt_text(&self.file_path),
            self.rating.map_or(SqlValue::Null, SqlValue::F64),
            self.created_at.to_sql_value(),
            self.updated_at.to_sql_value(),
        ]
    }

    fn canonical(&self) -> CanonicalRow {
        CanonicalRow(vec![
            Some(self.id.to_string()),
            Some(self.title.clone()),
            Some(self.r#type.as_str().to_string()),
            self.description.clone(),
            self.creation_date.as_ref().map(to_canonical_date),
            self.file_path.clone(),
            self.rating.map(|r| r.to_string()),
            canon_date(&self.created_at),
            canon_date(&self.updated_at),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: Uuid,
    pub full_name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Record for Person {
    const TABLE: LogicalTable = LogicalTable::Person;

    fn from_row(row: Row) -> Result<Self, MappingError> {
        let mut b = FieldBinder::new(Self::TABLE, row);
        let record = Self {
            id: b.uuid("id")?,
            full_name: b.text("full_name")?,
            created_at: b.timestamp("created_at")?,
            updated_at: b.timestamp("updated_at")?,
        };
        b.finish()?;
        Ok(record)
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            text(&self.full_name),
            self.created_at.to_sql_value(),
            self.updated_at.to_sql_value(),
        ]
    }

    fn canonical(&self) -> CanonicalRow {
        CanonicalRow(vec![
            Some(self.id.to_string()),
            Some(self.full_name.clone()),
            canon_date(&self.created_at),
            canon_date(&self.updated_at),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonFilmWork {
    pub id: Uuid,
    pub film_work_id: Uuid,
    pub person_id: Uuid,
    pub role: PersonRole,
    pub created_at: Timestamp,
}

impl Record for PersonFilmWork {
    const TABLE: LogicalTable = LogicalTable::PersonFilmWork;

    fn from_row(row: Row) -> Result<Self, MappingError> {
        let mut b = FieldBinder::new(Self::TABLE, row);
        let record = Self {
            id: b.uuid("id")?,
            film_work_id: b.uuid("film_work_id")?,
            person_id: b.uuid("person_id")?,
            role: b.parse("role", PersonRole::parse)?,
            created_at: b.timestamp("created_at")?,
        };
        b.finish()?;
        Ok(record)
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            SqlValue::Uuid(self.film_work_id),
            SqlValue::Uuid(self.person_id),
            text(self.role.as_str()),
            self.created_at.to_sql_value(),
        ]
    }

    fn canonical(&self) -> CanonicalRow {
        CanonicalRow(vec![
            Some(self.id.to_string()),
            Some(self.film_work_id.to_string()),
            Some(self.person_id.to_string()),
            Some(self.role.as_str().to_string()),
            canon_date(&self.created_at),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenreFilmWork {
    pub id: Uuid,
    pub film_work_id: Uuid,
    pub genre_id: Uuid,
    pub created_at: Timestamp,
}

impl Record for GenreFilmWork {
    const TABLE: LogicalTable = LogicalTable::GenreFilmWork;

    fn from_row(row: Row) -> Result<Self, MappingError> {
        let mut b = FieldBinder::new(Self::TABLE, row);
        let record = Self {
            id: b.uuid("id")?,
            film_work_id: b.uuid("film_work_id")?,
            genre_id: b.uuid("genre_id")?,
            created_at: b.timestamp("created_at")?,
        };
        b.finish()?;
        Ok(record)
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(self.id),
            SqlValue::Uuid(self.film_work_id),
            SqlValue::Uuid(self.genre_id),
            self.created_at.to_sql_value(),
        ]
    }

    fn canonical(&self) -> CanonicalRow {
        CanonicalRow(vec![
            Some(self.id.to_string()),
            Some(self.film_work_id.to_string()),
            Some(self.genre_id.to_string()),
            canon_date(&self.created_at),
        ])
    }
}
