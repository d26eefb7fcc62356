//! Store drivers.
//!
//! Each driver implements the traits in [`crate::core::traits`]:
//!
//! - [`sqlite`]: the source, read-only ([`TableReader`](crate::core::TableReader))
//! - [`postgres`]: the target, bulk writes and paged reads
//!   ([`TargetWriter`](crate::core::TargetWriter))
//! - [`memory`]: an in-process store implementing both, used in tests
//! - [`common`]: shared utilities (TLS)

pub mod common;
pub mod memory;
pub mod postgres;
pub mod sqlite;

pub use common::{SslMode, TlsBuilder};
pub use memory::MemoryStore;
pub use postgres::PostgresWriter;
pub use sqlite::SqliteReader;
