use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Malformed {column} for {instrument_id}: {value}")]
    Malformed {
        instrument_id: String,
        column: &'static str,
        value: String,
    },

    #[error("Store not available: {0}")]
    Unavailable(String),
}
