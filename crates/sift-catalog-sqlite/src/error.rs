//! Error type for `sift-catalog-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("catalog snapshot {0} does not exist")]
  MissingSnapshot(PathBuf),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
