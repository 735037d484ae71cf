pub mod error;
pub mod memory;
pub mod reader;
pub mod sqlite;

pub use error::StoreError;
pub use reader::SnapshotReader;
pub use sqlite::SqliteStore;
