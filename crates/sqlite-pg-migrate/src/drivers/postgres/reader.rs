//! PostgreSQL read path used by the consistency checker.
//!
//! Pages are pulled through a portal inside a read-only transaction, so the
//! table is never fully materialized and all pages come from one snapshot.

use deadpool_postgres::Pool;
use tokio::sync::mpsc;
use tokio_postgres::types::Type;
use tracing::debug;

use crate::core::identifier::{column_list, qualify, quote_ident};
use crate::core::schema::LogicalTable;
use crate::core::value::{Batch, Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Stream `schema.table` into `tx` in pages of `batch_size`, ordered by id.
pub(super) async fn read_table_internal(
    pool: Pool,
    schema: String,
    table: LogicalTable,
    batch_size: usize,
    tx: &mpsc::Sender<Result<Batch>>,
) -> Result<()> {
    let mut client = pool
        .get()
        .await
        .map_err(|e| MigrateError::pool(e, "getting connection for read_table"))?;

    let sql = format!(
        "SELECT {} FROM {} ORDER BY {}",
        column_list(&table.column_names())?,
        qualify(&schema, table.name())?,
        quote_ident(table.primary_key())?
    );

    let txn = client
        .build_transaction()
        .read_only(true)
        .start()
        .await?;
    let portal = txn.bind(sql.as_str(), &[]).await?;
    let page_rows = i32::try_from(batch_size).unwrap_or(i32::MAX).max(1);

    let mut sent = 0usize;
    loop {
        let rows = txn.query_portal(&portal, page_rows).await?;
        if rows.is_empty() {
            break;
        }
        let last = rows.len() < page_rows as usize;

        let mut page = Vec::with_capacity(rows.len());
        for r in &rows {
            page.push(convert_row(r)?);
        }
        if tx.send(Ok(Batch::new(page))).await.is_err() {
            return Ok(());
        }
        sent += 1;

        if last {
            break;
        }
    }

    txn.commit().await?;
    debug!("{}: streamed {} pages from postgres", table, sent);
    Ok(())
}

fn convert_row(row: &tokio_postgres::Row) -> Result<Row> {
    let mut out = Row::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        out.push(column.name(), convert_pg_value(row, idx, column.type_())?);
    }
    Ok(out)
}

/// Convert a PostgreSQL column value by its wire type.
fn convert_pg_value(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> Result<SqlValue> {
    fn opt<T, F>(v: Option<T>, f: F) -> SqlValue
    where
        F: FnOnce(T) -> SqlValue,
    {
        v.map(f).unwrap_or(SqlValue::Null)
    }

    let value = match *ty {
        Type::BOOL => opt(row.try_get::<_, Option<bool>>(idx)?, SqlValue::Bool),
        Type::INT2 => opt(row.try_get::<_, Option<i16>>(idx)?, |v| SqlValue::I64(v.into())),
        Type::INT4 => opt(row.try_get::<_, Option<i32>>(idx)?, |v| SqlValue::I64(v.into())),
        Type::INT8 => opt(row.try_get::<_, Option<i64>>(idx)?, SqlValue::I64),
        Type::FLOAT4 => opt(row.try_get::<_, Option<f32>>(idx)?, |v| SqlValue::F64(v.into())),
        Type::FLOAT8 => opt(row.try_get::<_, Option<f64>>(idx)?, SqlValue::F64),
        Type::UUID => opt(row.try_get::<_, Option<uuid::Uuid>>(idx)?, SqlValue::Uuid),
        Type::DATE => opt(
            row.try_get::<_, Option<chrono::NaiveDate>>(idx)?,
            SqlValue::Date,
        ),
        Type::TIMESTAMP => opt(
            row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)?,
            SqlValue::DateTime,
        ),
        Type::TIMESTAMPTZ => opt(
            row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)?,
            SqlValue::DateTimeTz,
        ),
        Type::BYTEA => opt(row.try_get::<_, Option<Vec<u8>>>(idx)?, SqlValue::Bytes),
        _ => opt(row.try_get::<_, Option<String>>(idx)?, SqlValue::Text),
    };
    Ok(value)
}
