//! Core abstractions shared by the drivers, the migration driver and the checker.
//!
//! - [`schema`]: the five logical tables and their column declarations
//! - [`value`]: SQL values, name-keyed rows and pages
//! - [`traits`]: [`TableReader`] and [`TargetWriter`], plus per-row write outcomes
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{ColumnDef, LogicalTable};
pub use traits::{InsertOutcome, TableReader, TargetWriter, WriteReport};
pub use value::{Batch, Row, SqlValue};
