//! PostgreSQL target driver.
//!
//! [`PostgresWriter`] implements both halves of the store interface: bulk
//! inserts for the migration, and paged reads for the consistency check.

mod reader;
mod writer;

pub use writer::PostgresWriter;
