//! The analysis cache.
//!
//! Scoring a candidate is a pure function of its metadata and the scoring
//! policy, so a previous result can be reused until either changes. Each
//! entry records the analysis time and a SHA-256 fingerprint of its inputs;
//! an entry is stale when the source table was altered after the analysis or
//! when the fingerprint no longer matches.
//!
//! The cache is an ordinary artifact passed explicitly through the pipeline.
//! Confirmation is never cached: it is always re-derived from the current
//! thresholds.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
  candidate::{AiFeature, Candidate, CandidateKey, CandidateScores},
  catalog::{ColumnMetadata, ConstraintKind},
  lookup::MetadataLookups,
  profile::{ColumnProfile, EstimatePolicy},
  score::CandidateScoringPolicy,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  #[serde(flatten)]
  pub key:                 CandidateKey,
  pub analyzed_at:         DateTime<Utc>,
  /// The table's `last_altered` as seen at analysis time.
  pub source_last_altered: Option<DateTime<Utc>>,
  pub fingerprint:         String,
  pub scores:              CandidateScores,
  pub profile:             ColumnProfile,
}

/// Why a cached entry could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
  Absent,
  /// The table was altered after the entry was analysed.
  TableAltered,
  /// Metadata or scoring policy changed.
  InputsChanged,
}

impl fmt::Display for Miss {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Absent => "not cached",
      Self::TableAltered => "table altered since analysis",
      Self::InputsChanged => "inputs changed since analysis",
    })
  }
}

/// Cached analyses by candidate key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CacheEntry>", into = "Vec<CacheEntry>")]
pub struct AnalysisCache(BTreeMap<CandidateKey, CacheEntry>);

impl From<Vec<CacheEntry>> for AnalysisCache {
  fn from(entries: Vec<CacheEntry>) -> Self {
    Self(entries.into_iter().map(|e| (e.key.clone(), e)).collect())
  }
}

impl From<AnalysisCache> for Vec<CacheEntry> {
  fn from(cache: AnalysisCache) -> Self { cache.0.into_values().collect() }
}

impl AnalysisCache {
  /// The entry for `key` if it is still valid for the given table state and
  /// input fingerprint.
  pub fn lookup(
    &self,
    key: &CandidateKey,
    table_last_altered: Option<DateTime<Utc>>,
    fingerprint: &str,
  ) -> Result<&CacheEntry, Miss> {
    let entry = self.0.get(key).ok_or(Miss::Absent)?;
    if table_last_altered.is_some_and(|altered| altered > entry.analyzed_at) {
      return Err(Miss::TableAltered);
    }
    if entry.fingerprint != fingerprint {
      return Err(Miss::InputsChanged);
    }
    Ok(entry)
  }

  /// Insert or replace the entry for its key.
  pub fn insert(&mut self, entry: CacheEntry) {
    self.0.insert(entry.key.clone(), entry);
  }

  pub fn get(&self, key: &CandidateKey) -> Option<&CacheEntry> {
    self.0.get(key)
  }

  pub fn retain(&mut self, mut keep: impl FnMut(&CandidateKey) -> bool) {
    self.0.retain(|key, _| keep(key));
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

// ─── Fingerprint ─────────────────────────────────────────────────────────────

/// Everything a candidate's score depends on.
#[derive(Serialize)]
struct ScoringInputs<'a> {
  feature:          AiFeature,
  detection_reason: &'a str,
  columns:          Vec<&'a ColumnMetadata>,
  table_comment:    Option<&'a str>,
  stage_comment:    Option<&'a str>,
  constraints:      Vec<ConstraintKind>,
  scoring:          &'a CandidateScoringPolicy,
  estimates:        &'a EstimatePolicy,
}

/// SHA-256 over the candidate's metadata inputs and the scoring policy,
/// hex-encoded.
pub fn fingerprint(
  candidate: &Candidate,
  lookups: &MetadataLookups,
  scoring: &CandidateScoringPolicy,
  estimates: &EstimatePolicy,
) -> serde_json::Result<String> {
  let inputs = ScoringInputs {
    feature: candidate.ai_feature,
    detection_reason: &candidate.detection_reason,
    columns: candidate
      .columns()
      .into_iter()
      .filter_map(|name| lookups.column(&candidate.table.column(name)))
      .collect(),
    table_comment: lookups
      .table(&candidate.table)
      .and_then(|t| t.comment.as_deref()),
    stage_comment: lookups
      .stages()
      .iter()
      .find(|s| {
        candidate.ai_feature == AiFeature::DocumentAi
          && s.key() == candidate.table
      })
      .and_then(|s| s.comment.as_deref()),
    constraints: lookups
      .constraints(&candidate.table)
      .map(|c| c.kinds.iter().copied().collect())
      .unwrap_or_default(),
    scoring,
    estimates,
  };

  let mut hasher = Sha256::new();
  hasher.update(serde_json::to_vec(&inputs)?);
  Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;
  use crate::{
    catalog::TableKey, config::DatabaseScope, lookup::Inventory,
  };

  fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 0, 0, 0).unwrap()
  }

  fn column(comment: Option<&str>) -> ColumnMetadata {
    ColumnMetadata {
      table:                TableKey::new("DB", "S", "T"),
      column:               "NOTES".into(),
      ordinal_position:     1,
      data_type:            "VARCHAR".into(),
      character_max_length: Some(2000),
      numeric_precision:    None,
      numeric_scale:        None,
      is_nullable:          true,
      comment:              comment.map(String::from),
    }
  }

  fn lookups(column: &ColumnMetadata) -> MetadataLookups {
    let inventory = Inventory {
      columns: vec![column.clone()],
      ..Default::default()
    };
    MetadataLookups::new(&inventory, &DatabaseScope::all())
  }

  fn entry(key: CandidateKey, fingerprint: &str) -> CacheEntry {
    CacheEntry {
      key,
      analyzed_at: at(10),
      source_last_altered: Some(at(1)),
      fingerprint: fingerprint.into(),
      scores: CandidateScores::new(4.0, 3.0, 1.0, 5.0),
      profile: ColumnProfile::default(),
    }
  }

  #[test]
  fn fingerprint_tracks_metadata_and_policy() {
    let plain = column(None);
    let candidate = Candidate::for_column(&plain, AiFeature::Llm, "long text");
    let scoring = CandidateScoringPolicy::default();
    let estimates = EstimatePolicy::default();

    let a = fingerprint(&candidate, &lookups(&plain), &scoring, &estimates)
      .unwrap();
    let again = fingerprint(&candidate, &lookups(&plain), &scoring, &estimates)
      .unwrap();
    assert_eq!(a, again);
    assert_eq!(a.len(), 64);

    let commented = column(Some("free-form notes"));
    let b = fingerprint(&candidate, &lookups(&commented), &scoring, &estimates)
      .unwrap();
    assert_ne!(a, b);

    let tuned = EstimatePolicy {
      nullable_null_pct: 5.0,
      ..Default::default()
    };
    let c = fingerprint(&candidate, &lookups(&plain), &scoring, &tuned)
      .unwrap();
    assert_ne!(a, c);
  }

  #[test]
  fn lookup_rejects_stale_entries() {
    let plain = column(None);
    let key = Candidate::for_column(&plain, AiFeature::Llm, "x").key();
    let mut cache = AnalysisCache::default();
    assert_eq!(cache.lookup(&key, None, "f").err(), Some(Miss::Absent));

    cache.insert(entry(key.clone(), "f"));
    assert!(cache.lookup(&key, Some(at(5)), "f").is_ok());
    assert!(cache.lookup(&key, None, "f").is_ok());
    assert_eq!(
      cache.lookup(&key, Some(at(10) + Duration::hours(1)), "f").err(),
      Some(Miss::TableAltered)
    );
    assert_eq!(
      cache.lookup(&key, Some(at(5)), "g").err(),
      Some(Miss::InputsChanged)
    );
  }

  #[test]
  fn serialises_as_sorted_entries() {
    let plain = column(None);
    let llm = Candidate::for_column(&plain, AiFeature::Llm, "x").key();
    let search = Candidate::for_table(
      plain.table.clone(),
      AiFeature::SearchRag,
      "x",
      vec![],
    )
    .key();
    let mut cache = AnalysisCache::default();
    cache.insert(entry(search.clone(), "s"));
    cache.insert(entry(llm.clone(), "l"));

    let json = serde_json::to_string(&cache).unwrap();
    let back: AnalysisCache = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cache);
    let first: Vec<CacheEntry> = cache.into();
    assert_eq!(first[0].key, llm);
  }
}
