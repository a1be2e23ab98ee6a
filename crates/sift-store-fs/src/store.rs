//! [`FsStore`]: the filesystem implementation of [`ArtifactStore`].

use std::{
  fs,
  io::{self, Write as _},
  path::{Path, PathBuf},
};

use sift_core::{
  artifact::{self, Artifact, ArtifactKind},
  store::ArtifactStore,
};
use tracing::debug;

use crate::{
  Error, Result,
  layout::{backup_dir_name, file_name},
};

/// Artifacts stored as JSON files in one output directory.
#[derive(Debug, Clone)]
pub struct FsStore {
  dir: PathBuf,
}

impl FsStore {
  /// Open the store at `dir`, creating the directory if needed.
  pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
    let dir = dir.into();
    fs::create_dir_all(&dir).map_err(Error::io(&dir))?;
    Ok(Self { dir })
  }

  /// A store at `dir` without creating it. Reads see an empty store until
  /// the directory exists; writes fail.
  pub fn at(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

  pub fn dir(&self) -> &Path { &self.dir }

  /// Where `kind` lives, whether or not it has been written.
  pub fn path(&self, kind: ArtifactKind) -> PathBuf {
    self.dir.join(file_name(kind))
  }

  fn read(&self, kind: ArtifactKind) -> Result<Option<Vec<u8>>> {
    let path = self.path(kind);
    match fs::read(&path) {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(Error::io(path)(e)),
    }
  }

  /// Write through a temporary file in the same directory, then rename.
  fn write_atomic(&self, kind: ArtifactKind, bytes: &[u8]) -> Result<()> {
    let path = self.path(kind);
    let mut file =
      tempfile::NamedTempFile::new_in(&self.dir).map_err(Error::io(&self.dir))?;
    file.write_all(bytes).map_err(Error::io(file.path()))?;
    file.as_file().sync_all().map_err(Error::io(file.path()))?;
    file.persist(&path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote artifact");
    Ok(())
  }
}

impl ArtifactStore for FsStore {
  type Error = Error;

  fn load<A: Artifact>(&self) -> Result<Option<A>> {
    let Some(bytes) = self.read(A::KIND)? else {
      return Ok(None);
    };
    artifact::decode(&bytes)
      .map(Some)
      .map_err(|source| Error::Json {
        path: self.path(A::KIND),
        source,
      })
  }

  fn save<A: Artifact>(&self, value: &A) -> Result<()> {
    let bytes = artifact::encode(value).map_err(|source| Error::Json {
      path: self.path(A::KIND),
      source,
    })?;
    self.write_atomic(A::KIND, &bytes)
  }

  fn contains(&self, kind: ArtifactKind) -> Result<bool> {
    self.path(kind).try_exists().map_err(Error::io(self.path(kind)))
  }

  /// Copy every artifact file into a sibling directory named after the
  /// output directory and `label`.
  fn backup(&self, label: &str) -> Result<Option<String>> {
    let present: Vec<ArtifactKind> = ArtifactKind::all()
      .map(|kind| self.contains(kind).map(|found| (kind, found)))
      .collect::<Result<Vec<_>>>()?
      .into_iter()
      .filter_map(|(kind, found)| found.then_some(kind))
      .collect();
    if present.is_empty() {
      return Ok(None);
    }

    let dir_name = self
      .dir
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "output".to_owned());
    let target = self.dir.with_file_name(backup_dir_name(&dir_name, label));
    if target.exists() {
      return Err(Error::BackupExists(target));
    }
    fs::create_dir_all(&target).map_err(Error::io(&target))?;

    for kind in &present {
      let to = target.join(file_name(*kind));
      fs::copy(self.path(*kind), &to).map_err(Error::io(&to))?;
    }
    debug!(
      target = %target.display(),
      artifacts = present.len(),
      "backed up output directory"
    );
    Ok(Some(target.display().to_string()))
  }
}
