//! In-memory store implementing both store traits.
//!
//! Enforces the same unique keys as the target schema, so the migration
//! driver and the consistency checker can be exercised without a database.
//! Reads and writes can be made to fail per table.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::schema::LogicalTable;
use crate::core::traits::{
    partition_rows, resolve_outcomes, TableReader, TargetWriter, WriteReport,
    READ_CHANNEL_CAPACITY,
};
use crate::core::value::{Batch, Row, SqlValue};
use crate::error::{MigrateError, Result};

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<LogicalTable, Vec<Row>>>,
    failing_reads: HashSet<LogicalTable>,
    failing_writes: HashSet<LogicalTable>,
    reverse_pages: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a table with rows, bypassing key checks.
    pub fn with_rows(self, table: LogicalTable, rows: Vec<Row>) -> Self {
        self.lock().entry(table).or_default().extend(rows);
        self
    }

    /// Every read of `table` yields an error item.
    pub fn fail_reads(mut self, table: LogicalTable) -> Self {
        self.failing_reads.insert(table);
        self
    }

    /// Every write to `table` fails without storing anything.
    pub fn fail_writes(mut self, table: LogicalTable) -> Self {
        self.failing_writes.insert(table);
        self
    }

    /// Return each page in reverse id order. Page boundaries are unchanged.
    pub fn reverse_pages(mut self) -> Self {
        self.reverse_pages = true;
        self
    }

    /// Snapshot of a table in insertion order.
    pub fn rows(&self, table: LogicalTable) -> Vec<Row> {
        self.lock().get(&table).cloned().unwrap_or_default()
    }

    /// Replace one field of the row with the given id. Returns whether a row matched.
    pub fn update_field(&self, table: LogicalTable, id: &str, field: &str, value: SqlValue) -> bool {
        let mut tables = self.lock();
        let Some(rows) = tables.get_mut(&table) else {
            return false;
        };
        for row in rows.iter_mut() {
            if row.get("id").and_then(SqlValue::to_text).as_deref() == Some(id) {
                *row = row
                    .clone()
                    .into_fields()
                    .into_iter()
                    .map(|(n, v)| if n == field { (n, value.clone()) } else { (n, v) })
                    .collect();
                return true;
            }
        }
        false
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<LogicalTable, Vec<Row>>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn id_key(row: &Row) -> String {
    row.get("id").and_then(SqlValue::to_text).unwrap_or_default()
}

fn key_of(row: &Row, columns: &[&str]) -> Vec<Option<String>> {
    columns
        .iter()
        .map(|c| row.get(c).and_then(SqlValue::to_text))
        .collect()
}

#[async_trait]
impl TableReader for MemoryStore {
    fn read_table(&self, table: LogicalTable, batch_size: usize) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(READ_CHANNEL_CAPACITY);

        let pages: Result<Vec<Batch>> = if self.failing_reads.contains(&table) {
            Err(MigrateError::transfer(table.name(), "read failed"))
        } else {
            let mut rows = self.rows(table);
            rows.sort_by_key(id_key);
            Ok(rows
                .chunks(batch_size.max(1))
                .map(|chunk| {
                    let mut page = chunk.to_vec();
                    if self.reverse_pages {
                        page.reverse();
                    }
                    Batch::new(page)
                })
                .collect())
        };

        tokio::spawn(async move {
            match pages {
                Ok(pages) => {
                    for page in pages {
                        if tx.send(Ok(page)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                }
            }
        });

        rx
    }

    async fn get_row_count(&self, table: LogicalTable) -> Result<i64> {
        if self.failing_reads.contains(&table) {
            return Err(MigrateError::transfer(table.name(), "count failed"));
        }
        Ok(self.lock().get(&table).map_or(0, Vec::len) as i64)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

#[async_trait]
impl TargetWriter for MemoryStore {
    async fn write_batch(
        &self,
        table: LogicalTable,
        columns: &[&str],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<WriteReport> {
        if self.failing_writes.contains(&table) {
            return Err(MigrateError::transfer(table.name(), "write failed"));
        }

        let (accepted, outcomes) = partition_rows(columns, rows);
        let mut tables = self.lock();
        let stored = tables.entry(table).or_default();

        let mut seen: Vec<HashSet<Vec<Option<String>>>> = table
            .unique_keys()
            .iter()
            .map(|key| stored.iter().map(|r| key_of(r, key)).collect())
            .collect();

        let mut inserted = HashSet::new();
        for row in &accepted {
            let new_row: Row = columns
                .iter()
                .map(|c| c.to_string())
                .zip(row.values.iter().cloned())
                .collect();
            let keys: Vec<_> = table
                .unique_keys()
                .iter()
                .map(|key| key_of(&new_row, key))
                .collect();
            if keys.iter().zip(&seen).any(|(k, set)| set.contains(k)) {
                continue;
            }
            for (k, set) in keys.into_iter().zip(seen.iter_mut()) {
                set.insert(k);
            }
            inserted.insert(row.id);
            stored.push(new_row);
        }

        Ok(resolve_outcomes(&accepted, outcomes, inserted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::InsertOutcome;
    use uuid::Uuid;

    fn gfw(id: Uuid, film: Uuid, genre: Uuid) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(id),
            SqlValue::Uuid(film),
            SqlValue::Uuid(genre),
            SqlValue::Text("2021-06-16".into()),
        ]
    }

    #[tokio::test]
    async fn test_duplicate_pair_is_skipped() {
        let store = MemoryStore::new();
        let columns = LogicalTable::GenreFilmWork.column_names();
        let (film, genre) = (Uuid::new_v4(), Uuid::new_v4());

        let report = store
            .write_batch(
                LogicalTable::GenreFilmWork,
                &columns,
                vec![
                    gfw(Uuid::new_v4(), film, genre),
                    gfw(Uuid::new_v4(), film, genre),
                ],
            )
            .await
            .unwrap();

        assert_eq!(
            report.outcomes,
            vec![InsertOutcome::Inserted, InsertOutcome::SkippedDuplicate]
        );
        assert_eq!(
            store.get_row_count(LogicalTable::GenreFilmWork).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_reverse_pages_keeps_boundaries() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let rows = ids
            .iter()
            .map(|id| Row::new().with("id", SqlValue::Uuid(*id)))
            .collect();
        let store = MemoryStore::new()
            .with_rows(LogicalTable::Genre, rows)
            .reverse_pages();

        let mut sorted = ids.clone();
        sorted.sort_by_key(|id| id.to_string());

        let mut rx = store.read_table(LogicalTable::Genre, 2);
        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.rows[0].get("id"), Some(&SqlValue::Uuid(sorted[1])));
        assert_eq!(first.rows[1].get("id"), Some(&SqlValue::Uuid(sorted[0])));
        let second = rx.recv().await.unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_failing_reads_and_writes() {
        let store = MemoryStore::new()
            .fail_reads(LogicalTable::Person)
            .fail_writes(LogicalTable::Genre);

        let mut rx = store.read_table(LogicalTable::Person, 10);
        assert!(matches!(rx.recv().await, Some(Err(_))));
        assert!(store.get_row_count(LogicalTable::Person).await.is_err());

        let columns = LogicalTable::Genre.column_names();
        assert!(store
            .write_batch(LogicalTable::Genre, &columns, vec![])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_update_field() {
        let id = Uuid::new_v4();
        let store = MemoryStore::new().with_rows(
            LogicalTable::Person,
            vec![Row::new()
                .with("id", SqlValue::Uuid(id))
                .with("full_name", SqlValue::Text("A".into()))],
        );
        assert!(store.update_field(
            LogicalTable::Person,
            &id.to_string(),
            "full_name",
            SqlValue::Text("B".into())
        ));
        let rows = store.rows(LogicalTable::Person);
        assert_eq!(rows[0].get("full_name"), Some(&SqlValue::Text("B".into())));
        assert!(!store.update_field(LogicalTable::Person, "nope", "full_name", SqlValue::Null));
    }
}
