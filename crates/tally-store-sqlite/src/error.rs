//! Error type for `tally-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] tally_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value outside its known set (e.g. an unknown role).
  #[error("unknown {column} value: {value:?}")]
  UnknownValue { column: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Domain failures pass through unchanged; anything else means the store
/// could not do its job.
impl From<Error> for tally_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      other => tally_core::Error::Store(Box::new(other)),
    }
  }
}
