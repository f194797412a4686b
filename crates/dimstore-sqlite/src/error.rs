//! Error type for `dimstore-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] dimstore_core::Error),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("timestamp out of range: {0}")]
  Timestamp(i64),

  /// An existing database whose columns cannot serve this configuration.
  #[error("incompatible schema: {0}")]
  Schema(String),

  #[error("cannot build SQL: {0}")]
  SqlBuild(String),
}

impl Error {
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::Core(e) if e.is_not_found())
  }
}

impl From<dimstore_core::ConfigError> for Error {
  fn from(e: dimstore_core::ConfigError) -> Self { Self::Core(e.into()) }
}

impl From<dimstore_core::IdError> for Error {
  fn from(e: dimstore_core::IdError) -> Self { Self::Core(e.into()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
