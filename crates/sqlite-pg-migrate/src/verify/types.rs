//! Result types for the consistency check.

use serde::{Deserialize, Serialize};

use crate::core::schema::LogicalTable;
use crate::error::Result;

/// Which store a finding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Source,
    Target,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Source => f.write_str("source"),
            Side::Target => f.write_str("target"),
        }
    }
}

/// A discrepancy between the stores. Findings are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// Row counts differ.
    CountMismatch { source: i64, target: i64 },

    /// Content was not compared because an earlier check already failed.
    ContentSkipped,

    /// One store produced more pages than the other.
    BatchCountMismatch {
        source_batches: usize,
        target_batches: usize,
    },

    /// A pair of pages holds different rows. `row_id` and `column` locate
    /// the first difference after sorting, from the source side.
    BatchMismatch {
        batch_index: usize,
        row_id: Option<String>,
        column: Option<String>,
    },

    /// Reading failed; the sequence was not silently cut short.
    ReadFailed { side: Side, message: String },

    /// A row could not be mapped to its record.
    Unmappable { side: Side, message: String },
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Finding::CountMismatch { source, target } => {
                write!(f, "row count mismatch: source={} target={}", source, target)
            }
            Finding::ContentSkipped => f.write_str("content comparison skipped"),
            Finding::BatchCountMismatch {
                source_batches,
                target_batches,
            } => write!(
                f,
                "batch count mismatch: source={} target={}",
                source_batches, target_batches
            ),
            Finding::BatchMismatch {
                batch_index,
                row_id,
                column,
            } => write!(
                f,
                "batch {} differs (row {}, column {})",
                batch_index,
                row_id.as_deref().unwrap_or("?"),
                column.as_deref().unwrap_or("?")
            ),
            Finding::ReadFailed { side, message } => write!(f, "{} read failed: {}", side, message),
            Finding::Unmappable { side, message } => {
                write!(f, "{} row unmappable: {}", side, message)
            }
        }
    }
}

/// Outcome of checking one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableVerifyResult {
    pub table: LogicalTable,
    pub source_count: Option<i64>,
    pub target_count: Option<i64>,
    pub batches_compared: usize,
    pub rows_compared: usize,
    pub findings: Vec<Finding>,
    pub duration_ms: u64,
}

impl TableVerifyResult {
    pub fn new(table: LogicalTable) -> Self {
        Self {
            table,
            source_count: None,
            target_count: None,
            batches_compared: 0,
            rows_compared: 0,
            findings: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Outcome of a full check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyResult {
    pub tables: Vec<TableVerifyResult>,
    pub tables_checked: usize,
    pub tables_clean: usize,
    pub duration_ms: u64,
}

impl VerifyResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, result: TableVerifyResult) {
        self.tables_checked += 1;
        if result.is_clean() {
            self.tables_clean += 1;
        }
        self.tables.push(result);
    }

    /// Clean only if every table is clean.
    pub fn is_clean(&self) -> bool {
        self.tables.iter().all(TableVerifyResult::is_clean)
    }

    pub fn table(&self, table: LogicalTable) -> Option<&TableVerifyResult> {
        self.tables.iter().find(|t| t.table == table)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
