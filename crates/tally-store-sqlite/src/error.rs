//! Error type for `tally-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] tally_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A count or total read back from SQLite does not fit the domain type.
  #[error("value out of range in column {column}: {value}")]
  OutOfRange {
    column: &'static str,
    value:  i64,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
