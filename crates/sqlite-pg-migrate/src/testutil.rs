//! Source-shaped rows for driver and checker tests.
//!
//! Rows look the way the SQLite reader delivers them: ids and timestamps as
//! text, ratings as reals.

use crate::core::schema::LogicalTable;
use crate::core::value::{Row, SqlValue};
use crate::drivers::memory::MemoryStore;

const CREATED: &str = "2021-06-16 20:14:09.221838+00";
const UPDATED: &str = "2021-06-16 20:14:09.221855+00";

/// Deterministic id, distinct per table and index, sortable by index.
pub fn id(table: LogicalTable, i: usize) -> String {
    let tag = LogicalTable::MIGRATION_ORDER
        .iter()
        .position(|t| *t == table)
        .unwrap_or(0);
    format!("{:08x}-0000-4000-8000-{:012x}", tag + 1, i)
}

fn text(s: impl Into<String>) -> SqlValue {
    SqlValue::Text(s.into())
}

pub fn genre(i: usize) -> Row {
    Row::new()
        .with("id", text(id(LogicalTable::Genre, i)))
        .with("name", text(format!("Genre {}", i)))
        .with("description", SqlValue::Null)
        .with("created_at", text(CREATED))
        .with("updated_at", text(UPDATED))
}

pub fn film_work(i: usize) -> Row {
    Row::new()
        .with("id", text(id(LogicalTable::FilmWork, i)))
        .with("title", text(format!("Film {}", i)))
        .with("type", text(if i % 2 == 0 { "movie" } else { "tv_show" }))
        .with("description", text("Plot"))
        .with("creation_date", SqlValue::Null)
        .with("file_path", SqlValue::Null)
        .with("rating", SqlValue::F64((i % 100) as f64 / 10.0))
        .with("created_at", text(CREATED))
        .with("updated_at", text(UPDATED))
}

pub fn person(i: usize) -> Row {
    Row::new()
        .with("id", text(id(LogicalTable::Person, i)))
        .with("full_name", text(format!("Person {}", i)))
        .with("created_at", text(CREATED))
        .with("updated_at", text(UPDATED))
}

pub fn person_film_work(i: usize, film: usize, person: usize, role: &str) -> Row {
    Row::new()
        .with("id", text(id(LogicalTable::PersonFilmWork, i)))
        .with("film_work_id", text(id(LogicalTable::FilmWork, film)))
        .with("person_id", text(id(LogicalTable::Person, person)))
        .with("role", text(role))
        .with("created_at", text(CREATED))
}

pub fn genre_film_work(i: usize, film: usize, genre: usize) -> Row {
    Row::new()
        .with("id", text(id(LogicalTable::GenreFilmWork, i)))
        .with("film_work_id", text(id(LogicalTable::FilmWork, film)))
        .with("genre_id", text(id(LogicalTable::Genre, genre)))
        .with("created_at", text(CREATED))
}

/// A source with `n` rows in every table.
pub fn catalog(n: usize) -> MemoryStore {
    MemoryStore::new()
        .with_rows(LogicalTable::Genre, (0..n).map(genre).collect())
        .with_rows(LogicalTable::FilmWork, (0..n).map(film_work).collect())
        .with_rows(LogicalTable::Person, (0..n).map(person).collect())
        .with_rows(
            LogicalTable::PersonFilmWork,
            (0..n).map(|i| person_film_work(i, i, i, "actor")).collect(),
        )
        .with_rows(
            LogicalTable::GenreFilmWork,
            (0..n).map(|i| genre_film_work(i, i, i)).collect(),
        )
}
