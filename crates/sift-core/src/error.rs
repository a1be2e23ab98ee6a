//! Error types for `sift-core`.

use thiserror::Error;

use crate::{artifact::ArtifactKind, stage::Stage};

/// Boxed error from a backend (store or catalog source).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("catalog source failed: {0}")]
  Source(#[source] BoxError),

  /// A persisted artifact exists but could not be read back.
  #[error("failed to load {artifact}: {source}")]
  Load {
    artifact: ArtifactKind,
    #[source]
    source:   BoxError,
  },

  #[error("failed to persist {artifact}: {source}")]
  Persist {
    artifact: ArtifactKind,
    #[source]
    source:   BoxError,
  },

  #[error("failed to back up prior artifacts: {0}")]
  Backup(#[source] BoxError),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// Configuration problems. All of them are detected before any stage runs.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
  #[error(
    "unknown stage {0:?}; expected a label (1, 2, 2A, 2B, 2C, 2D, 2E, 3, 4) \
     or a stage name"
  )]
  UnknownStage(String),

  #[error("stop-after stage {stop} comes before start stage {start}")]
  StopBeforeStart { start: Stage, stop: Stage },

  #[error("invalid database name {0:?}")]
  InvalidDatabaseName(String),

  #[error("unknown run mode {0:?}; expected `fresh` or `append`")]
  UnknownRunMode(String),

  #[error("table weights must be non-negative and sum to 1.0 (sum is {0})")]
  InvalidWeights(f64),

  #[error("{name} must be within {min}..={max} (got {value})")]
  OutOfRange {
    name:  &'static str,
    value: f64,
    min:   f64,
    max:   f64,
  },

  #[error(
    "staleness horizon ({horizon} days) must be greater than the fresh \
     window ({window} days)"
  )]
  InvalidFreshness { window: u32, horizon: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
