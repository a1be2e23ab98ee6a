//! Run modes and the append-only run history.

use std::{collections::BTreeSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;

/// How a run's candidates relate to the ones already persisted.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
  /// Replace the candidate set with this run's candidates.
  #[default]
  Fresh,
  /// Merge this run's candidates into the existing set.
  Append,
}

impl fmt::Display for RunMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Fresh => "fresh",
      Self::Append => "append",
    })
  }
}

impl FromStr for RunMode {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "fresh" => Ok(Self::Fresh),
      "append" => Ok(Self::Append),
      _ => Err(ConfigError::UnknownRunMode(s.to_owned())),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHistoryEntry {
  pub run_id:    Uuid,
  pub timestamp: DateTime<Utc>,
  pub mode:      RunMode,
  /// Databases covered by this invocation.
  pub databases: BTreeSet<String>,
  /// Human-readable scope filter, e.g. `all databases except: SCRATCH`.
  pub scope:     String,
}

/// Every recorded run, oldest first, plus the databases the current
/// candidate set covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHistory {
  pub runs:               Vec<RunHistoryEntry>,
  pub databases_analyzed: BTreeSet<String>,
  pub last_updated:       Option<DateTime<Utc>>,
}

impl RunHistory {
  /// Append a run. A fresh run replaced the candidate set, so the analysed
  /// set restarts from its databases; an append run extends it.
  pub fn record(&mut self, entry: RunHistoryEntry) {
    match entry.mode {
      RunMode::Fresh => {
        self.databases_analyzed = entry.databases.clone();
      }
      RunMode::Append => {
        self.databases_analyzed.extend(entry.databases.iter().cloned());
      }
    }
    self.last_updated = Some(entry.timestamp);
    self.runs.push(entry);
  }

  pub fn last(&self) -> Option<&RunHistoryEntry> { self.runs.last() }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn entry(mode: RunMode, dbs: &[&str], day: u32) -> RunHistoryEntry {
    RunHistoryEntry {
      run_id: Uuid::new_v4(),
      timestamp: Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap(),
      mode,
      databases: dbs.iter().map(|d| (*d).to_owned()).collect(),
      scope: "test".into(),
    }
  }

  #[test]
  fn append_unions_and_fresh_resets() {
    let mut history = RunHistory::default();
    history.record(entry(RunMode::Fresh, &["A"], 1));
    history.record(entry(RunMode::Append, &["B"], 2));
    assert_eq!(
      history.databases_analyzed,
      BTreeSet::from(["A".to_owned(), "B".to_owned()])
    );

    history.record(entry(RunMode::Fresh, &["C"], 3));
    assert_eq!(history.databases_analyzed, BTreeSet::from(["C".to_owned()]));
    assert_eq!(history.runs.len(), 3);
    assert_eq!(history.last_updated, history.last().map(|r| r.timestamp));
  }

  #[test]
  fn run_mode_parses() {
    assert_eq!("Append".parse::<RunMode>(), Ok(RunMode::Append));
    assert_eq!(
      "merge".parse::<RunMode>(),
      Err(ConfigError::UnknownRunMode("merge".into()))
    );
  }
}
