//! Core traits for reading from and writing to the two stores.
//!
//! - [`TableReader`]: streams pages of rows and counts rows
//! - [`TargetWriter`]: idempotent bulk inserts, plus the read path for verification
//!
//! The driver and the checker only see these traits, so both run unchanged
//! against SQLite/PostgreSQL or the in-memory store.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;

use super::schema::LogicalTable;
use super::value::{Batch, SqlValue};

/// Bounded so a reader never runs more than one page ahead of its consumer.
pub const READ_CHANNEL_CAPACITY: usize = 1;

/// Read rows from a store.
///
/// # Streaming
///
/// [`read_table`](TableReader::read_table) returns a channel receiver. The
/// sequence ends when the channel closes; a failure is delivered as an `Err`
/// item, after which nothing further is sent. A consumer can therefore always
/// tell "no more data" from "error retrieving data".
#[async_trait]
pub trait TableReader: Send + Sync {
    /// Start streaming a table in pages of at most `batch_size` rows, ordered by `id`.
    ///
    /// Each call opens a fresh cursor at the start of the table.
    fn read_table(&self, table: LogicalTable, batch_size: usize) -> mpsc::Receiver<Result<Batch>>;

    /// Get the row count for a table.
    async fn get_row_count(&self, table: LogicalTable) -> Result<i64>;

    /// Round-trip a trivial query to prove the connection is usable.
    async fn ping(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "sqlite", "postgres").
    fn db_type(&self) -> &str;

    /// Release the underlying connection.
    async fn close(&self);
}

/// Write rows to the target store.
#[async_trait]
pub trait TargetWriter: TableReader {
    /// Insert a page of rows in a single statement and a single transaction.
    ///
    /// Rows that collide with an existing row are skipped. Rows whose shape
    /// does not match `columns` are rejected without being sent. On error
    /// nothing from the page is committed.
    async fn write_batch(
        &self,
        table: LogicalTable,
        columns: &[&str],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<WriteReport>;
}

/// Outcome of writing one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum InsertOutcome {
    /// The row is new and was inserted.
    Inserted,
    /// A row with the same key already exists; nothing was written.
    SkippedDuplicate,
    /// The row was not attempted.
    Rejected(String),
}

/// Per-row outcomes for one write call, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReport {
    pub outcomes: Vec<InsertOutcome>,
}

impl WriteReport {
    /// Append another report's outcomes.
    pub fn merge(&mut self, other: WriteReport) {
        self.outcomes.extend(other.outcomes);
    }

    /// Rows inserted.
    pub fn inserted(&self) -> usize {
        self.count(|o| matches!(o, InsertOutcome::Inserted))
    }

    /// Rows skipped as duplicates.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, InsertOutcome::SkippedDuplicate))
    }

    /// Rows rejected before writing.
    pub fn rejected(&self) -> usize {
        self.count(|o| matches!(o, InsertOutcome::Rejected(_)))
    }

    fn count(&self, pred: impl Fn(&InsertOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// A row that passed shape checks, paired with its slot in the input.
#[derive(Debug)]
pub struct AcceptedRow {
    pub index: usize,
    pub id: Uuid,
    pub values: Vec<SqlValue>,
}

/// Split a page into rows that can be sent and per-row outcomes for those that cannot.
///
/// `columns` must start with `id`. The returned outcome vector has one slot per
/// input row; accepted rows hold a placeholder until the write resolves them.
pub fn partition_rows(
    columns: &[&str],
    rows: Vec<Vec<SqlValue>>,
) -> (Vec<AcceptedRow>, Vec<InsertOutcome>) {
    let mut accepted = Vec::with_capacity(rows.len());
    let mut outcomes = Vec::with_capacity(rows.len());

    for (index, values) in rows.into_iter().enumerate() {
        if values.len() != columns.len() {
            outcomes.push(InsertOutcome::Rejected(format!(
                "expected {} values, got {}",
                columns.len(),
                values.len()
            )));
            continue;
        }
        let id = match (columns.first(), values.first()) {
            (Some(&"id"), Some(SqlValue::Uuid(id))) => *id,
            (Some(&"id"), Some(SqlValue::Text(s))) => match Uuid::parse_str(s) {
                Ok(id) => id,
                Err(e) => {
                    outcomes.push(InsertOutcome::Rejected(format!("invalid id '{}': {}", s, e)));
                    continue;
                }
            },
            _ => {
                outcomes.push(InsertOutcome::Rejected(
                    "first column must be a non-null id".to_string(),
                ));
                continue;
            }
        };
        outcomes.push(InsertOutcome::Inserted);
        accepted.push(AcceptedRow { index, id, values });
    }

    (accepted, outcomes)
}

/// Resolve accepted rows against the set of ids the store reports as newly written.
///
/// Each returned id is credited once, so a second row repeating an id inside
/// the same page resolves as a duplicate.
pub fn resolve_outcomes(
    accepted: &[AcceptedRow],
    mut outcomes: Vec<InsertOutcome>,
    mut inserted_ids: HashSet<Uuid>,
) -> WriteReport {
    for row in accepted {
        outcomes[row.index] = if inserted_ids.remove(&row.id) {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::SkippedDuplicate
        };
    }
    WriteReport { outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid_row(id: Uuid, name: &str) -> Vec<SqlValue> {
        vec![SqlValue::Uuid(id), SqlValue::Text(name.to_string())]
    }

    #[test]
    fn test_partition_rejects_wrong_shape() {
        let id = Uuid::new_v4();
        let rows = vec![uuid_row(id, "Drama"), vec![SqlValue::Uuid(Uuid::new_v4())]];
        let (accepted, outcomes) = partition_rows(&["id", "name"], rows);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, id);
        assert!(matches!(outcomes[1], InsertOutcome::Rejected(_)));
    }

    #[test]
    fn test_partition_rejects_null_id() {
        let rows = vec![vec![SqlValue::Null, SqlValue::Text("x".into())]];
        let (accepted, outcomes) = partition_rows(&["id", "name"], rows);
        assert!(accepted.is_empty());
        assert!(matches!(outcomes[0], InsertOutcome::Rejected(_)));
    }

    #[test]
    fn test_resolve_outcomes() {
        let fresh = Uuid::new_v4();
        let existing = Uuid::new_v4();
        let rows = vec![uuid_row(fresh, "Drama"), uuid_row(existing, "Comedy")];
        let (accepted, outcomes) = partition_rows(&["id", "name"], rows);
        let inserted: HashSet<Uuid> = [fresh].into_iter().collect();
        let report = resolve_outcomes(&accepted, outcomes, inserted);
        assert_eq!(
            report.outcomes,
            vec![InsertOutcome::Inserted, InsertOutcome::SkippedDuplicate]
        );
        assert_eq!(report.inserted(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.rejected(), 0);
    }

    #[test]
    fn test_repeated_id_in_page_credited_once() {
        let id = Uuid::new_v4();
        let rows = vec![uuid_row(id, "Drama"), uuid_row(id, "Drama")];
        let (accepted, outcomes) = partition_rows(&["id", "name"], rows);
        let report = resolve_outcomes(&accepted, outcomes, [id].into_iter().collect());
        assert_eq!(report.inserted(), 1);
        assert_eq!(report.skipped(), 1);
    }

    #[test]
    fn test_report_merge() {
        let mut a = WriteReport {
            outcomes: vec![InsertOutcome::Inserted],
        };
        a.merge(WriteReport {
            outcomes: vec![InsertOutcome::Rejected("bad".into())],
        });
        assert_eq!(a.outcomes.len(), 2);
        assert_eq!(a.rejected(), 1);
    }
}
