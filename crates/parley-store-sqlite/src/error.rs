//! Error type for `parley-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] parley_core::Error),

  /// A uniqueness or foreign-key constraint rejected the statement.
  #[error("conflict: {0}")]
  Conflict(String),

  /// The connection dropped and could not be recovered by one reconnect.
  #[error("database connection lost: {0}")]
  ConnectionLost(#[source] tokio_rusqlite::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
