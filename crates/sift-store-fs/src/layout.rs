//! Output directory layout.

use sift_core::artifact::ArtifactKind;

/// The file an artifact kind is stored under, e.g. `candidate_set.json`.
pub fn file_name(kind: ArtifactKind) -> String {
  let stem: &'static str = kind.into();
  format!("{stem}.json")
}

/// Name of the sibling directory a backup of `dir_name` is copied into.
pub(crate) fn backup_dir_name(dir_name: &str, label: &str) -> String {
  format!("{dir_name}_{label}")
}
