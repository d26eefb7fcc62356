//! # sqlite-pg-migrate
//!
//! Migrates the film catalog (genres, persons, film works and their two join
//! tables) from a SQLite file into an existing PostgreSQL schema, then proves
//! the copy is complete and equivalent row by row.
//!
//! - **Idempotent** bulk inserts: rows that already exist are skipped, never updated
//! - **Per-table isolation**: one failing table does not stop the others
//! - **Strict row mapping**: unknown fields, bad UUIDs and unknown enum values
//!   reject the row, not the page
//! - **Consistency check** by row count and sorted, date-normalized page contents
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_pg_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> sqlite_pg_migrate::Result<()> {
//!     let config = Config::from_env()?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Inserted {} rows", result.rows_inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod verify;

#[cfg(test)]
mod testutil;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use crate::core::{InsertOutcome, LogicalTable, TableReader, TargetWriter, WriteReport};
pub use drivers::{MemoryStore, PostgresWriter, SqliteReader};
pub use error::{MigrateError, Result};
pub use orchestrator::{health_check, HealthCheckResult, MigrationResult, Orchestrator, TableStatus};
pub use verify::{Finding, VerifyEngine, VerifyResult};
