//! PostgreSQL target writer.
//!
//! Implements [`TargetWriter`] with multi-row `INSERT .. ON CONFLICT DO NOTHING`
//! statements, one transaction per page. Every parameter is bound as text and
//! cast server-side to the column's declared type, so SQLite's text timestamps
//! go in exactly as stored.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio::sync::mpsc;
use tokio_postgres::types::ToSql;
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::reader::read_table_internal;
use crate::config::TargetConfig;
use crate::core::identifier::{column_list, qualify, quote_ident};
use crate::core::schema::{ColumnDef, LogicalTable};
use crate::core::traits::{
    partition_rows, resolve_outcomes, AcceptedRow, TableReader, TargetWriter, WriteReport,
    READ_CHANNEL_CAPACITY,
};
use crate::core::value::{Batch, SqlValue};
use crate::drivers::common::{SslMode, TlsBuilder};
use crate::error::{MigrateError, Result};

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bind parameter limit of the PostgreSQL wire protocol.
const MAX_BIND_PARAMS: usize = 65_535;

/// The pipeline is sequential; one connection is all it ever needs.
const MAX_CONNECTIONS: usize = 1;

/// PostgreSQL target writer.
pub struct PostgresWriter {
    pool: Pool,
    schema: String,
}

impl PostgresWriter {
    /// Connect to the target and verify the connection.
    pub async fn new(config: &TargetConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.application_name("sqlite-pg-migrate");
        // Text timestamps without an offset are read as UTC.
        pg_config.options("-c TimeZone=UTC");
        pg_config.keepalives(true);
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match TlsBuilder::new(SslMode::parse(&config.ssl_mode)?).build()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };

        let pool = Pool::builder(mgr)
            .max_size(MAX_CONNECTIONS)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        let writer = Self {
            pool,
            schema: config.schema.clone(),
        };
        writer.ping().await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{} (schema {})",
            config.host, config.port, config.database, config.schema
        );
        Ok(writer)
    }

    /// Insert one chunk and return the ids the server reports as new.
    async fn insert_chunk(
        txn: &tokio_postgres::Transaction<'_>,
        sql: &str,
        rows: &[AcceptedRow],
    ) -> Result<Vec<Uuid>> {
        let params: Vec<Option<String>> = rows
            .iter()
            .flat_map(|r| r.values.iter().map(SqlValue::to_text))
            .collect();
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let returned = txn.query(sql, &refs).await?;
        returned
            .iter()
            .map(|r| r.try_get::<_, Uuid>(0).map_err(MigrateError::from))
            .collect()
    }
}

/// Build a multi-row insert for `rows` rows of `columns`.
///
/// Placeholders are numbered row-major and cast from text to each column's type.
pub(crate) fn build_insert_sql(
    qualified_table: &str,
    columns: &[&ColumnDef],
    rows: usize,
) -> Result<String> {
    let names: Vec<&str> = columns.iter().map(|c| c.name).collect();
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ",
        qualified_table,
        column_list(&names)?
    );

    let mut param = 1;
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            if col.pg_type == "text" {
                sql.push_str(&format!("${}::text", param));
            } else {
                sql.push_str(&format!("${}::text::{}", param, col.pg_type));
            }
            param += 1;
        }
        sql.push(')');
    }

    sql.push_str(&format!(
        " ON CONFLICT DO NOTHING RETURNING {}",
        quote_ident("id")?
    ));
    Ok(sql)
}

/// Rows per statement so one statement stays under the bind parameter limit.
fn rows_per_statement(column_count: usize) -> usize {
    (MAX_BIND_PARAMS / column_count.max(1)).max(1)
}

#[async_trait]
impl TableReader for PostgresWriter {
    fn read_table(&self, table: LogicalTable, batch_size: usize) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(READ_CHANNEL_CAPACITY);
        let pool = self.pool.clone();
        let schema = self.schema.clone();

        tokio::spawn(async move {
            if let Err(e) = read_table_internal(pool, schema, table, batch_size, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    async fn get_row_count(&self, table: LogicalTable) -> Result<i64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting connection for get_row_count"))?;

        let query = format!(
            "SELECT COUNT(*)::int8 FROM {}",
            qualify(&self.schema, table.name())?
        );
        let row = client.query_one(query.as_str(), &[]).await?;
        Ok(row.try_get::<_, i64>(0)?)
    }

    async fn ping(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "testing PostgreSQL connection"))?;
        client.simple_query("SELECT 1").await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    async fn write_batch(
        &self,
        table: LogicalTable,
        columns: &[&str],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<WriteReport> {
        let defs = columns
            .iter()
            .map(|name| {
                table.column(name).ok_or_else(|| {
                    MigrateError::transfer(table.name(), format!("unknown column '{}'", name))
                })
            })
            .collect::<Result<Vec<&ColumnDef>>>()?;

        let (accepted, outcomes) = partition_rows(columns, rows);
        if accepted.is_empty() {
            return Ok(resolve_outcomes(&accepted, outcomes, HashSet::new()));
        }

        let qualified = qualify(&self.schema, table.name())?;
        let per_statement = rows_per_statement(defs.len());

        let mut client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "getting connection for write_batch"))?;
        let txn = client.transaction().await?;

        let mut inserted = HashSet::with_capacity(accepted.len());
        for chunk in accepted.chunks(per_statement) {
            let sql = build_insert_sql(&qualified, &defs, chunk.len())?;
            inserted.extend(Self::insert_chunk(&txn, &sql, chunk).await?);
        }
        txn.commit().await?;

        let report = resolve_outcomes(&accepted, outcomes, inserted);
        debug!(
            "{}: page written, {} inserted, {} skipped, {} rejected",
            table,
            report.inserted(),
            report.skipped(),
            report.rejected()
        );
        Ok(report)
    }
}
