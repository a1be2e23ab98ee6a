//! The outbound report and its persisted summary.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  candidate::{AiFeature, Candidate},
  history::RunMode,
  merge::CandidateSet,
  round2,
  score::{ReadinessBand, TableReadinessScore},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSummary {
  pub candidates: usize,
  pub confirmed:  usize,
}

/// Table counts per readiness band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandCounts {
  pub high:   usize,
  pub medium: usize,
  pub low:    usize,
}

impl BandCounts {
  fn add(&mut self, band: ReadinessBand) {
    match band {
      ReadinessBand::High => self.high += 1,
      ReadinessBand::Medium => self.medium += 1,
      ReadinessBand::Low => self.low += 1,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
  pub generated_at:         Option<DateTime<Utc>>,
  pub mode:                 RunMode,
  /// Databases represented in the cumulative candidate set.
  pub databases:            BTreeSet<String>,
  pub total_candidates:     usize,
  pub confirmed_candidates: usize,
  pub by_feature:           BTreeMap<AiFeature, FeatureSummary>,
  pub tables_scored:        usize,
  pub average_table_score:  Option<f64>,
  pub readiness_bands:      BandCounts,
}

impl RunSummary {
  pub fn build(
    candidates: &CandidateSet,
    table_scores: &[TableReadinessScore],
    mode: RunMode,
    now: DateTime<Utc>,
  ) -> Self {
    let mut by_feature = BTreeMap::<AiFeature, FeatureSummary>::new();
    for candidate in candidates.iter() {
      let entry = by_feature.entry(candidate.ai_feature).or_default();
      entry.candidates += 1;
      if candidate.is_confirmed {
        entry.confirmed += 1;
      }
    }

    let mut readiness_bands = BandCounts::default();
    for score in table_scores {
      readiness_bands.add(score.band());
    }
    let average_table_score = (!table_scores.is_empty()).then(|| {
      round2(
        table_scores.iter().map(|s| s.total).sum::<f64>()
          / table_scores.len() as f64,
      )
    });

    Self {
      generated_at: Some(now),
      mode,
      databases: candidates.iter().map(|c| c.database().to_owned()).collect(),
      total_candidates: candidates.len(),
      confirmed_candidates: candidates.confirmed().count(),
      by_feature,
      tables_scored: table_scores.len(),
      average_table_score,
      readiness_bands,
    }
  }
}

/// Everything a caller gets back from a completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
  pub summary:      RunSummary,
  /// The cumulative candidate set, in key order.
  pub candidates:   Vec<Candidate>,
  pub table_scores: Vec<TableReadinessScore>,
}
