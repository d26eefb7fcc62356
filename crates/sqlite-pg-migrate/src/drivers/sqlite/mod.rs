//! SQLite source driver.

mod reader;

pub use reader::SqliteReader;
