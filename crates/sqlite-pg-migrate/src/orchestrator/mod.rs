//! Migration driver - copies the five tables from source to target.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::schema::LogicalTable;
use crate::core::traits::{InsertOutcome, TableReader, TargetWriter};
use crate::drivers::{PostgresWriter, SqliteReader};
use crate::error::{MigrateError, Result};
use crate::model::map_row;

/// Migration driver.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn TableReader>,
    target: Arc<dyn TargetWriter>,
}

/// Per-table lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

/// Statistics for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResult {
    pub table: LogicalTable,
    pub status: TableStatus,
    pub rows_read: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableResult {
    fn new(table: LogicalTable) -> Self {
        Self {
            table,
            status: TableStatus::Pending,
            rows_read: 0,
            inserted: 0,
            skipped: 0,
            rejected: 0,
            duration_ms: 0,
            error: None,
        }
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// "partial" when a table failed, "completed_with_rejections" when every
    /// table is done but rows were rejected, otherwise "completed".
    pub status: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,

    /// Per-table statistics in migration order.
    pub tables: Vec<TableResult>,

    pub rows_read: usize,
    pub rows_inserted: usize,
    pub rows_skipped: usize,
    pub rows_rejected: usize,

    /// Tables that ended `Failed`.
    pub failed_tables: Vec<String>,
}

impl MigrationResult {
    /// Every table finished `Done` and no row was rejected.
    pub fn is_success(&self) -> bool {
        self.failed_tables.is_empty() && self.rows_rejected == 0
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn table(&self, table: LogicalTable) -> Option<&TableResult> {
        self.tables.iter().find(|t| t.table == table)
    }
}

/// Connectivity of both stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Open both stores from configuration.
    ///
    /// Fails before any table is touched if either store is unreachable.
    pub async fn new(config: Config) -> Result<Self> {
        let source = SqliteReader::new(&config.source).await?;
        let target = PostgresWriter::new(&config.target).await?;
        Ok(Self::with_stores(config, Arc::new(source), Arc::new(target)))
    }

    /// Build a driver over already opened stores.
    pub fn with_stores(
        config: Config,
        source: Arc<dyn TableReader>,
        target: Arc<dyn TargetWriter>,
    ) -> Self {
        Self {
            config,
            source,
            target,
        }
    }

    /// Run the migration over every table in order.
    ///
    /// Table failures are recorded and the run moves on; only cancellation
    /// ends the run early.
    pub async fn run(&self, cancel: CancellationToken) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let batch_size = self.config.migration.get_batch_size();

        info!(
            "Starting migration run {}: {} -> {} (batch size {})",
            run_id,
            self.source.db_type(),
            self.target.db_type(),
            batch_size
        );

        let mut tables: Vec<TableResult> = LogicalTable::MIGRATION_ORDER
            .iter()
            .map(|t| TableResult::new(*t))
            .collect();

        for result in tables.iter_mut() {
            if cancel.is_cancelled() {
                warn!("Cancellation requested, {} not started", result.table);
                return Err(MigrateError::Cancelled);
            }

            result.status = TableStatus::InProgress;
            info!("{}: migrating", result.table);
            let table_clock = Instant::now();

            let outcome = self.migrate_table(result, batch_size, &cancel).await;
            result.duration_ms = table_clock.elapsed().as_millis() as u64;

            match outcome {
                Ok(()) => {
                    result.status = TableStatus::Done;
                    info!(
                        "{}: done ({} read, {} inserted, {} skipped, {} rejected)",
                        result.table,
                        result.rows_read,
                        result.inserted,
                        result.skipped,
                        result.rejected
                    );
                }
                Err(MigrateError::Cancelled) => {
                    warn!(
                        "{}: cancelled after {} rows; committed pages are kept",
                        result.table, result.rows_read
                    );
                    return Err(MigrateError::Cancelled);
                }
                Err(e) => {
                    result.status = TableStatus::Failed;
                    error!("{}: failed - {}", result.table, e);
                    result.error = Some(e.to_string());
                }
            }
        }

        let failed_tables: Vec<String> = tables
            .iter()
            .filter(|t| t.status == TableStatus::Failed)
            .map(|t| t.table.to_string())
            .collect();

        let result = MigrationResult {
            run_id,
            status: if !failed_tables.is_empty() {
                "partial"
            } else if tables.iter().any(|t| t.rejected > 0) {
                "completed_with_rejections"
            } else {
                "completed"
            }
            .to_string(),
            started_at,
            completed_at: Utc::now(),
            duration_seconds: clock.elapsed().as_secs_f64(),
            rows_read: tables.iter().map(|t| t.rows_read).sum(),
            rows_inserted: tables.iter().map(|t| t.inserted).sum(),
            rows_skipped: tables.iter().map(|t| t.skipped).sum(),
            rows_rejected: tables.iter().map(|t| t.rejected).sum(),
            tables,
            failed_tables,
        };

        info!(
            "Migration {}: {} rows read, {} inserted, {} skipped, {} rejected in {:.1}s",
            result.status,
            result.rows_read,
            result.rows_inserted,
            result.rows_skipped,
            result.rows_rejected,
            result.duration_seconds
        );

        Ok(result)
    }

    /// Copy one table page by page, accumulating into `stats`.
    async fn migrate_table(
        &self,
        stats: &mut TableResult,
        batch_size: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let table = stats.table;
        let columns = table.column_names();
        let mut pages = self.source.read_table(table, batch_size);
        let mut page_no = 0usize;

        while let Some(page) = pages.recv().await {
            let page = page?;
            page_no += 1;
            stats.rows_read += page.len();

            let mut values = Vec::with_capacity(page.len());
            for row in page.rows {
                match map_row(table, row) {
                    Ok(record) => values.push(record.values()),
                    Err(e) => {
                        warn!("Rejected row: {}", e);
                        stats.rejected += 1;
                    }
                }
            }

            if !values.is_empty() {
                let report = self.target.write_batch(table, &columns, values).await?;
                for outcome in &report.outcomes {
                    if let InsertOutcome::Rejected(reason) = outcome {
                        warn!("{}: row rejected by writer: {}", table, reason);
                    }
                }
                stats.inserted += report.inserted();
                stats.skipped += report.skipped();
                stats.rejected += report.rejected();
            }

            debug!(
                "{}: page {} written ({} rows so far)",
                table, page_no, stats.rows_read
            );

            if cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }
        }

        Ok(())
    }

    /// Release both stores.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}

/// Open both stores and round-trip a trivial query on each.
///
/// Never fails; connection problems are reported in the result.
pub async fn health_check(config: &Config) -> HealthCheckResult {
    let clock = Instant::now();
    let source = match SqliteReader::new(&config.source).await {
        Ok(reader) => reader.ping().await,
        Err(e) => Err(e),
    };
    let source_latency_ms = clock.elapsed().as_millis() as u64;

    let clock = Instant::now();
    let target = match PostgresWriter::new(&config.target).await {
        Ok(writer) => {
            let ping = writer.ping().await;
            writer.close().await;
            ping
        }
        Err(e) => Err(e),
    };
    let target_latency_ms = clock.elapsed().as_millis() as u64;

    let result = HealthCheckResult {
        source_connected: source.is_ok(),
        source_latency_ms,
        source_error: source.err().map(|e| e.to_string()),
        target_connected: target.is_ok(),
        target_latency_ms,
        target_error: target.err().map(|e| e.to_string()),
        healthy: false,
    };
    HealthCheckResult {
        healthy: result.source_connected && result.target_connected,
        ..result
    }
}
