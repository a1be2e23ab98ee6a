//! The `ArtifactStore` trait and an in-memory implementation.
//!
//! Backends (e.g. `sift-store-fs`) persist artifacts as the exact bytes
//! produced by [`artifact::encode`](crate::artifact::encode); the pipeline
//! depends only on this abstraction.

use std::{collections::BTreeMap, sync::Mutex};

use crate::artifact::{self, Artifact, ArtifactKind};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over where a run's artifacts live.
///
/// Saving an artifact replaces any previous document of the same kind as a
/// whole; a reader never sees a partially written artifact.
pub trait ArtifactStore {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read back an artifact. `Ok(None)` means it was never written; a
  /// document that exists but does not decode is an error.
  fn load<A: Artifact>(&self) -> Result<Option<A>, Self::Error>;

  fn save<A: Artifact>(&self, artifact: &A) -> Result<(), Self::Error>;

  fn contains(&self, kind: ArtifactKind) -> Result<bool, Self::Error>;

  /// Copy every current artifact aside under `label`. Returns a description
  /// of where the copy went, or `None` if there was nothing to back up.
  fn backup(&self, label: &str) -> Result<Option<String>, Self::Error>;
}

// ─── In-memory store ─────────────────────────────────────────────────────────

type Documents = BTreeMap<ArtifactKind, Vec<u8>>;

/// Keeps encoded artifacts in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
  documents: Mutex<Documents>,
  backups:   Mutex<BTreeMap<String, Documents>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// The stored bytes for `kind`, exactly as written.
  pub fn raw(&self, kind: ArtifactKind) -> Option<Vec<u8>> {
    self.documents().get(&kind).cloned()
  }

  /// Overwrite the stored bytes for `kind` without encoding.
  pub fn put_raw(&self, kind: ArtifactKind, bytes: impl Into<Vec<u8>>) {
    self.documents().insert(kind, bytes.into());
  }

  /// Labels of every backup taken so far.
  pub fn backups(&self) -> Vec<String> {
    self
      .backups
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .keys()
      .cloned()
      .collect()
  }

  fn documents(&self) -> std::sync::MutexGuard<'_, Documents> {
    self.documents.lock().unwrap_or_else(|e| e.into_inner())
  }
}

impl ArtifactStore for MemoryStore {
  type Error = serde_json::Error;

  fn load<A: Artifact>(&self) -> Result<Option<A>, Self::Error> {
    self
      .documents()
      .get(&A::KIND)
      .map(|bytes| artifact::decode(bytes))
      .transpose()
  }

  fn save<A: Artifact>(&self, value: &A) -> Result<(), Self::Error> {
    let bytes = artifact::encode(value)?;
    self.documents().insert(A::KIND, bytes);
    Ok(())
  }

  fn contains(&self, kind: ArtifactKind) -> Result<bool, Self::Error> {
    Ok(self.documents().contains_key(&kind))
  }

  fn backup(&self, label: &str) -> Result<Option<String>, Self::Error> {
    let snapshot = self.documents().clone();
    if snapshot.is_empty() {
      return Ok(None);
    }
    self
      .backups
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .insert(label.to_owned(), snapshot);
    Ok(Some(format!("memory:{label}")))
  }
}
