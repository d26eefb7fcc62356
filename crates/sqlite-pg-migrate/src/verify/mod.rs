//! Consistency check between source and target.
//!
//! For each table, in migration order:
//!
//! 1. Compare row counts. A mismatch is reported and the content pass is skipped.
//! 2. Page through both stores in lockstep (both read in `id` order), map every
//!    row, canonicalize, sort each page and require the paired pages to be equal.
//!
//! Read errors, unmappable rows and differing page counts are findings, never
//! a silently shortened comparison.

pub mod types;

pub use types::{Finding, Side, TableVerifyResult, VerifyResult};

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::schema::LogicalTable;
use crate::core::traits::{TableReader, TargetWriter};
use crate::core::value::Batch;
use crate::error::{MigrateError, Result};
use crate::model::{map_row, CanonicalRow};

/// Engine for the consistency check.
pub struct VerifyEngine {
    source: Arc<dyn TableReader>,
    target: Arc<dyn TargetWriter>,
    batch_size: usize,
}

impl VerifyEngine {
    pub fn new(
        source: Arc<dyn TableReader>,
        target: Arc<dyn TargetWriter>,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            target,
            batch_size: batch_size.max(1),
        }
    }

    /// Check every table in migration order.
    pub async fn verify_all(&self, cancel: &CancellationToken) -> Result<VerifyResult> {
        let clock = Instant::now();
        let mut result = VerifyResult::new();

        for table in LogicalTable::MIGRATION_ORDER {
            if cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }
            let table_result = self.verify_table(table, cancel).await?;
            if table_result.is_clean() {
                info!(
                    "{}: consistent ({} rows, {} batches)",
                    table, table_result.rows_compared, table_result.batches_compared
                );
            } else {
                for finding in &table_result.findings {
                    warn!("{}: {}", table, finding);
                }
            }
            result.add_table(table_result);
        }

        result.duration_ms = clock.elapsed().as_millis() as u64;
        info!(
            "Check finished: {}/{} tables consistent",
            result.tables_clean, result.tables_checked
        );
        Ok(result)
    }

    /// Check one table.
    pub async fn verify_table(
        &self,
        table: LogicalTable,
        cancel: &CancellationToken,
    ) -> Result<TableVerifyResult> {
        let clock = Instant::now();
        let mut result = TableVerifyResult::new(table);

        self.compare_counts(&mut result).await;
        if result.is_clean() {
            self.compare_content(&mut result, cancel).await?;
        } else {
            result.findings.push(Finding::ContentSkipped);
        }

        result.duration_ms = clock.elapsed().as_millis() as u64;
        Ok(result)
    }

    async fn compare_counts(&self, result: &mut TableVerifyResult) {
        let table = result.table;
        match self.source.get_row_count(table).await {
            Ok(n) => result.source_count = Some(n),
            Err(e) => result.findings.push(Finding::ReadFailed {
                side: Side::Source,
                message: e.to_string(),
            }),
        }
        match self.target.get_row_count(table).await {
            Ok(n) => result.target_count = Some(n),
            Err(e) => result.findings.push(Finding::ReadFailed {
                side: Side::Target,
                message: e.to_string(),
            }),
        }
        if let (Some(source), Some(target)) = (result.source_count, result.target_count) {
            if source != target {
                result
                    .findings
                    .push(Finding::CountMismatch { source, target });
            }
        }
    }

    async fn compare_content(
        &self,
        result: &mut TableVerifyResult,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let table = result.table;
        let mut source = self.source.read_table(table, self.batch_size);
        let mut target = self.target.read_table(table, self.batch_size);
        let mut batch_index = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }

            let pair = (source.recv().await, target.recv().await);
            let (source_batch, target_batch) = match pair {
                (None, None) => break,
                (Some(Err(e)), _) => {
                    result.findings.push(Finding::ReadFailed {
                        side: Side::Source,
                        message: e.to_string(),
                    });
                    break;
                }
                (_, Some(Err(e))) => {
                    result.findings.push(Finding::ReadFailed {
                        side: Side::Target,
                        message: e.to_string(),
                    });
                    break;
                }
                (Some(Ok(_)), None) => {
                    let extra = drain(&mut source, Side::Source, result).await;
                    result.findings.push(Finding::BatchCountMismatch {
                        source_batches: batch_index + 1 + extra,
                        target_batches: batch_index,
                    });
                    break;
                }
                (None, Some(Ok(_))) => {
                    let extra = drain(&mut target, Side::Target, result).await;
                    result.findings.push(Finding::BatchCountMismatch {
                        source_batches: batch_index,
                        target_batches: batch_index + 1 + extra,
                    });
                    break;
                }
                (Some(Ok(s)), Some(Ok(t))) => (s, t),
            };

            let source_rows = canonicalize(table, source_batch, Side::Source, result);
            let target_rows = canonicalize(table, target_batch, Side::Target, result);
            if let (Some(s), Some(t)) = (source_rows, target_rows) {
                result.rows_compared += s.len();
                if let Some(finding) = compare_batch(table, batch_index, &s, &t) {
                    result.findings.push(finding);
                }
            }

            result.batches_compared += 1;
            debug!("{}: batch {} compared", table, batch_index);
            batch_index += 1;
        }

        Ok(())
    }
}

/// Count the remaining pages of a stream, recording a read failure if one occurs.
async fn drain(
    rx: &mut mpsc::Receiver<Result<Batch>>,
    side: Side,
    result: &mut TableVerifyResult,
) -> usize {
    let mut count = 0;
    while let Some(item) = rx.recv().await {
        match item {
            Ok(_) => count += 1,
            Err(e) => {
                result.findings.push(Finding::ReadFailed {
                    side,
                    message: e.to_string(),
                });
                break;
            }
        }
    }
    count
}

/// Map and canonicalize a page, sorted. `None` if any row failed to map.
fn canonicalize(
    table: LogicalTable,
    batch: Batch,
    side: Side,
    result: &mut TableVerifyResult,
) -> Option<Vec<CanonicalRow>> {
    let mut rows = Vec::with_capacity(batch.len());
    let mut mappable = true;
    for row in batch.rows {
        match map_row(table, row) {
            Ok(record) => rows.push(record.canonical()),
            Err(e) => {
                mappable = false;
                result.findings.push(Finding::Unmappable {
                    side,
                    message: e.to_string(),
                });
            }
        }
    }
    if !mappable {
        return None;
    }
    rows.sort();
    Some(rows)
}

/// Compare two sorted pages and locate the first difference.
fn compare_batch(
    table: LogicalTable,
    batch_index: usize,
    source: &[CanonicalRow],
    target: &[CanonicalRow],
) -> Option<Finding> {
    if source == target {
        return None;
    }

    let columns = table.columns();
    let mismatch = source
        .iter()
        .zip(target)
        .find_map(|(s, t)| s.first_difference(t).map(|col| (s, col)));

    let (row_id, column) = match mismatch {
        Some((row, col)) => (
            row.id().map(String::from),
            columns.get(col).map(|c| c.name.to_string()),
        ),
        None => {
            let common = source.len().min(target.len());
            let extra = source.get(common).or_else(|| target.get(common));
            (extra.and_then(|r| r.id()).map(String::from), None)
        }
    };

    Some(Finding::BatchMismatch {
        batch_index,
        row_id,
        column,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, MigrationConfig, SourceConfig, TargetConfig};
    use crate::core::value::SqlValue;
    use crate::drivers::MemoryStore;
    use crate::orchestrator::Orchestrator;
    use crate::testutil;
    use async_trait::async_trait;

    fn config() -> Config {
        Config {
            source: SourceConfig {
                path: "db.sqlite".into(),
            },
            target: TargetConfig {
                host: "localhost".into(),
                port: 5432,
                database: "movies".into(),
                user: "app".into(),
                password: String::new(),
                schema: "content".into(),
                ssl_mode: "disable".into(),
            },
            migration: MigrationConfig {
                batch_size: Some(3),
            },
        }
    }

    /// Migrate `n` rows per table into a fresh target.
    async fn migrated(n: usize, target: MemoryStore) -> (Arc<MemoryStore>, Arc<MemoryStore>) {
        let source = Arc::new(testutil::catalog(n));
        let target = Arc::new(target);
        Orchestrator::with_stores(config(), source.clone(), target.clone())
            .run(CancellationToken::new())
            .await
            .unwrap();
        (source, target)
    }

    async fn check(source: Arc<MemoryStore>, target: Arc<MemoryStore>) -> VerifyResult {
        VerifyEngine::new(source, target, 3)
            .verify_all(&CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_clean_after_migration() {
        let (source, target) = migrated(7, MemoryStore::new()).await;
        let result = check(source, target).await;
        assert!(result.is_clean(), "{:?}", result);
        assert_eq!(result.tables_checked, 5);
        let genre = result.table(LogicalTable::Genre).unwrap();
        assert_eq!(genre.rows_compared, 7);
        assert_eq!(genre.batches_compared, 3);
    }

    #[tokio::test]
    async fn test_empty_stores_are_clean() {
        let result = check(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new())).await;
        assert!(result.is_clean());
    }

    #[tokio::test]
    async fn test_physical_order_within_page_ignored() {
        let (source, target) = migrated(7, MemoryStore::new().reverse_pages()).await;
        assert!(check(source, target).await.is_clean());
    }

    #[tokio::test]
    async fn test_count_mismatch_skips_content() {
        let (_, target) = migrated(4, MemoryStore::new()).await;
        let source = Arc::new(testutil::catalog(5));
        let result = check(source, target).await;

        let genre = result.table(LogicalTable::Genre).unwrap();
        assert_eq!(
            genre.findings,
            vec![
                Finding::CountMismatch {
                    source: 5,
                    target: 4
                },
                Finding::ContentSkipped
            ]
        );
        assert_eq!(genre.batches_compared, 0);
        assert!(!result.is_clean());
    }

    #[tokio::test]
    async fn test_changed_field_located() {
        let (source, target) = migrated(5, MemoryStore::new()).await;
        let id = testutil::id(LogicalTable::Person, 4);
        assert!(target.update_field(
            LogicalTable::Person,
            &id,
            "full_name",
            SqlValue::Text("Someone Else".into())
        ));

        let result = check(source, target).await;
        let person = result.table(LogicalTable::Person).unwrap();
        assert_eq!(
            person.findings,
            vec![Finding::BatchMismatch {
                batch_index: 1,
                row_id: Some(id),
                column: Some("full_name".into()),
            }]
        );
        assert!(result.table(LogicalTable::Genre).unwrap().is_clean());
    }

    #[tokio::test]
    async fn test_null_rating_differs_from_zero() {
        let (source, target) = migrated(5, MemoryStore::new()).await;
        let id = testutil::id(LogicalTable::FilmWork, 0);
        assert!(target.update_field(LogicalTable::FilmWork, &id, "rating", SqlValue::Null));

        let result = check(source, target).await;
        let film = result.table(LogicalTable::FilmWork).unwrap();
        assert_eq!(
            film.findings,
            vec![Finding::BatchMismatch {
                batch_index: 0,
                row_id: Some(id),
                column: Some("rating".into()),
            }]
        );
    }

    #[tokio::test]
    async fn test_time_of_day_is_tolerated() {
        let (source, target) = migrated(2, MemoryStore::new()).await;
        let id = testutil::id(LogicalTable::Genre, 0);
        target.update_field(
            LogicalTable::Genre,
            &id,
            "updated_at",
            SqlValue::Text("2021-06-16T23:59:59".into()),
        );
        assert!(check(source, target).await.is_clean());
    }

    #[tokio::test]
    async fn test_target_read_failure_is_a_finding() {
        let source = Arc::new(testutil::catalog(2));
        let target = Arc::new(MemoryStore::new().fail_reads(LogicalTable::FilmWork));
        let result = check(source, target).await;
        let film = result.table(LogicalTable::FilmWork).unwrap();
        assert!(matches!(
            film.findings[0],
            Finding::ReadFailed {
                side: Side::Target,
                ..
            }
        ));
        assert_eq!(film.findings.last(), Some(&Finding::ContentSkipped));
    }

    #[tokio::test]
    async fn test_unmappable_source_row() {
        let (_, target) = migrated(1, MemoryStore::new()).await;
        let bad = testutil::genre(0).with("colour", SqlValue::Text("red".into()));
        let source = Arc::new(
            testutil::catalog(0)
                .with_rows(LogicalTable::Genre, vec![bad])
                .with_rows(LogicalTable::FilmWork, vec![testutil::film_work(0)])
                .with_rows(LogicalTable::Person, vec![testutil::person(0)])
                .with_rows(
                    LogicalTable::PersonFilmWork,
                    vec![testutil::person_film_work(0, 0, 0, "actor")],
                )
                .with_rows(
                    LogicalTable::GenreFilmWork,
                    vec![testutil::genre_film_work(0, 0, 0)],
                ),
        );
        let result = check(source, target).await;
        let genre = result.table(LogicalTable::Genre).unwrap();
        assert!(matches!(
            genre.findings.as_slice(),
            [Finding::Unmappable {
                side: Side::Source,
                ..
            }]
        ));
        assert!(result.table(LogicalTable::Person).unwrap().is_clean());
    }

    /// Reports the true count but pages at twice the requested size.
    struct CoarsePages(MemoryStore);

    #[async_trait]
    impl TableReader for CoarsePages {
        fn read_table(
            &self,
            table: LogicalTable,
            batch_size: usize,
        ) -> mpsc::Receiver<Result<Batch>> {
            self.0.read_table(table, batch_size * 2)
        }

        async fn get_row_count(&self, table: LogicalTable) -> Result<i64> {
            self.0.get_row_count(table).await
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        fn db_type(&self) -> &str {
            "coarse"
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn test_batch_count_mismatch() {
        let (_, target) = migrated(4, MemoryStore::new()).await;
        let source = Arc::new(CoarsePages(testutil::catalog(4)));
        let result = VerifyEngine::new(source, target, 3)
            .verify_table(LogicalTable::Genre, &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.findings.contains(&Finding::BatchCountMismatch {
            source_batches: 1,
            target_batches: 2,
        }));
    }

    #[tokio::test]
    async fn test_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let engine = VerifyEngine::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            10,
        );
        assert!(matches!(
            engine.verify_all(&cancel).await,
            Err(MigrateError::Cancelled)
        ));
    }
}
