//! Tests for `FsStore` against a temporary directory.

use std::fs;

use chrono::{TimeZone, Utc};
use sift_core::{
  artifact::{ArtifactKind, ConfirmedSet},
  history::{RunHistory, RunHistoryEntry, RunMode},
  store::ArtifactStore,
};
use uuid::Uuid;

use crate::{Error, FsStore};

fn history() -> RunHistory {
  let mut history = RunHistory::default();
  history.record(RunHistoryEntry {
    run_id:    Uuid::from_bytes([7; 16]),
    timestamp: Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap(),
    mode:      RunMode::Fresh,
    databases: ["SALES".to_owned()].into(),
    scope:     "databases: SALES".into(),
  });
  history
}

#[test]
fn missing_artifact_loads_as_none() {
  let dir = tempfile::tempdir().unwrap();
  let store = FsStore::open(dir.path().join("out")).unwrap();
  assert!(store.dir().is_dir());
  assert_eq!(store.load::<RunHistory>().unwrap(), None);
  assert!(!store.contains(ArtifactKind::RunHistory).unwrap());
}

#[test]
fn save_then_load() {
  let dir = tempfile::tempdir().unwrap();
  let store = FsStore::open(dir.path()).unwrap();
  store.save(&history()).unwrap();

  assert!(store.contains(ArtifactKind::RunHistory).unwrap());
  assert_eq!(store.load::<RunHistory>().unwrap(), Some(history()));

  let on_disk = fs::read_to_string(dir.path().join("run_history.json")).unwrap();
  assert!(on_disk.ends_with("}\n"));
  assert!(on_disk.contains("\"databases_analyzed\""));
}

#[test]
fn save_replaces_and_leaves_no_temporaries() {
  let dir = tempfile::tempdir().unwrap();
  let store = FsStore::open(dir.path()).unwrap();
  store.save(&ConfirmedSet::default()).unwrap();
  store.save(&ConfirmedSet::default()).unwrap();
  store.save(&history()).unwrap();

  let mut names: Vec<_> = fs::read_dir(dir.path())
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  names.sort();
  assert_eq!(names, ["confirmed_set.json", "run_history.json"]);
}

#[test]
fn malformed_artifact_is_an_error() {
  let dir = tempfile::tempdir().unwrap();
  let store = FsStore::open(dir.path()).unwrap();
  fs::write(store.path(ArtifactKind::RunHistory), "{\"runs\": 3").unwrap();

  let err = store.load::<RunHistory>().unwrap_err();
  assert!(matches!(err, Error::Json { .. }), "{err}");
}

#[test]
fn backup_copies_artifacts_to_a_sibling() {
  let root = tempfile::tempdir().unwrap();
  let store = FsStore::open(root.path().join("results")).unwrap();
  assert_eq!(store.backup("backup_1").unwrap(), None);

  store.save(&history()).unwrap();
  let location = store.backup("backup_2").unwrap().expect("backed up");
  let copy = root.path().join("results_backup_2");
  assert_eq!(location, copy.display().to_string());
  assert_eq!(
    fs::read(copy.join("run_history.json")).unwrap(),
    fs::read(store.path(ArtifactKind::RunHistory)).unwrap()
  );

  let err = store.backup("backup_2").unwrap_err();
  assert!(matches!(err, Error::BackupExists(_)));
}
