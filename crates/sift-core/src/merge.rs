//! Folding a run's candidates into the cumulative candidate set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  candidate::{Candidate, CandidateKey},
  history::RunMode,
};

/// The cumulative candidate set, unique by key and serialised in key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Candidate>", into = "Vec<Candidate>")]
pub struct CandidateSet(BTreeMap<CandidateKey, Candidate>);

impl From<Vec<Candidate>> for CandidateSet {
  fn from(candidates: Vec<Candidate>) -> Self {
    Self(candidates.into_iter().map(|c| (c.key(), c)).collect())
  }
}

impl From<CandidateSet> for Vec<Candidate> {
  fn from(set: CandidateSet) -> Self { set.0.into_values().collect() }
}

impl CandidateSet {
  pub fn get(&self, key: &CandidateKey) -> Option<&Candidate> {
    self.0.get(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Candidate> { self.0.values() }

  pub fn confirmed(&self) -> impl Iterator<Item = &Candidate> {
    self.iter().filter(|c| c.is_confirmed)
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

/// What a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
  pub added:     usize,
  pub replaced:  usize,
  pub preserved: usize,
}

/// Merge `run` into `prior` according to `mode`.
///
/// Fresh mode ignores `prior` entirely. Append mode keeps every prior entry
/// the run does not touch and replaces those it does (last write wins).
pub fn merge(
  prior: CandidateSet,
  run: Vec<Candidate>,
  mode: RunMode,
) -> (CandidateSet, MergeStats) {
  let mut set = match mode {
    RunMode::Fresh => BTreeMap::new(),
    RunMode::Append => prior.0,
  };
  let before = set.len();
  let mut stats = MergeStats::default();

  for candidate in run {
    if set.insert(candidate.key(), candidate).is_some() {
      stats.replaced += 1;
    } else {
      stats.added += 1;
    }
  }
  stats.preserved = before.saturating_sub(stats.replaced);

  (CandidateSet(set), stats)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{candidate::AiFeature, catalog::TableKey};

  fn candidate(db: &str, table: &str, reason: &str) -> Candidate {
    Candidate::for_table(
      TableKey::new(db, "S", table),
      AiFeature::SearchRag,
      reason,
      vec!["A".into(), "B".into()],
    )
  }

  #[test]
  fn fresh_replaces_everything() {
    let prior = CandidateSet::from(vec![candidate("A", "T", "old")]);
    let (set, stats) =
      merge(prior, vec![candidate("B", "T", "new")], RunMode::Fresh);
    assert_eq!(set.len(), 1);
    assert_eq!(set.iter().next().map(|c| c.database()), Some("B"));
    assert_eq!(stats, MergeStats {
      added:     1,
      replaced:  0,
      preserved: 0,
    });
  }

  #[test]
  fn append_is_last_write_wins() {
    let prior = CandidateSet::from(vec![
      candidate("A", "T1", "kept"),
      candidate("A", "T2", "old"),
    ]);
    let (set, stats) = merge(
      prior,
      vec![candidate("A", "T2", "new"), candidate("B", "T", "added")],
      RunMode::Append,
    );
    let reasons: Vec<_> =
      set.iter().map(|c| c.detection_reason.as_str()).collect();
    assert_eq!(reasons, ["kept", "new", "added"]);
    assert_eq!(stats, MergeStats {
      added:     1,
      replaced:  1,
      preserved: 1,
    });
  }

  #[test]
  fn duplicate_keys_collapse_on_load() {
    let set = CandidateSet::from(vec![
      candidate("A", "T", "first"),
      candidate("A", "T", "second"),
    ]);
    assert_eq!(set.len(), 1);
    assert_eq!(
      set.iter().next().map(|c| c.detection_reason.as_str()),
      Some("second")
    );
  }
}
