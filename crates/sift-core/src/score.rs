//! Readiness scoring.
//!
//! Two independent, deterministic functions over the same lookups: a
//! five-dimension score per table (0–100) and a four-dimension score per
//! candidate (0–20).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  candidate::{AiFeature, Candidate, CandidateScores},
  catalog::{ConstraintKind, TableKey, TypeClass, has_text},
  error::ConfigError,
  lookup::MetadataLookups,
  profile::{ColumnProfile, EstimatePolicy},
  round2,
};

// ─── Table policy ────────────────────────────────────────────────────────────

/// Dimension weights of the table score. Must be non-negative and sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableWeights {
  pub comments:    f64,
  pub data_types:  f64,
  pub freshness:   f64,
  pub clustering:  f64,
  pub constraints: f64,
}

impl Default for TableWeights {
  fn default() -> Self {
    Self {
      comments:    0.25,
      data_types:  0.20,
      freshness:   0.25,
      clustering:  0.15,
      constraints: 0.15,
    }
  }
}

impl TableWeights {
  fn all(&self) -> [f64; 5] {
    [
      self.comments,
      self.data_types,
      self.freshness,
      self.clustering,
      self.constraints,
    ]
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    let weights = self.all();
    let sum: f64 = weights.iter().sum();
    let non_negative = weights.iter().all(|w| w.is_finite() && *w >= 0.0);
    if non_negative && (sum - 1.0).abs() <= 1e-6 {
      Ok(())
    } else {
      Err(ConfigError::InvalidWeights(sum))
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableScoringPolicy {
  pub weights:                TableWeights,
  /// Tables altered within this many days score full freshness.
  pub fresh_window_days:      u32,
  /// Tables untouched for this many days score zero freshness.
  pub staleness_horizon_days: u32,
}

impl Default for TableScoringPolicy {
  fn default() -> Self {
    Self {
      weights:                TableWeights::default(),
      fresh_window_days:      7,
      staleness_horizon_days: 365,
    }
  }
}

impl TableScoringPolicy {
  pub fn validate(&self) -> Result<(), ConfigError> {
    self.weights.validate()?;
    if self.staleness_horizon_days <= self.fresh_window_days {
      return Err(ConfigError::InvalidFreshness {
        window:  self.fresh_window_days,
        horizon: self.staleness_horizon_days,
      });
    }
    Ok(())
  }

  /// Linear decay from 100 at the fresh window to 0 at the horizon.
  fn freshness(&self, days: Option<i64>) -> f64 {
    let Some(days) = days else { return 0.0 };
    let window = i64::from(self.fresh_window_days);
    let horizon = i64::from(self.staleness_horizon_days);
    if days <= window {
      100.0
    } else if days >= horizon {
      0.0
    } else {
      100.0 * (horizon - days) as f64 / (horizon - window) as f64
    }
  }
}

// ─── Table scores ────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessBand {
  High,
  Medium,
  Low,
}

impl ReadinessBand {
  /// High at 70 and above, medium from 40, low below that.
  pub fn of(total: f64) -> Self {
    if total >= 70.0 {
      Self::High
    } else if total >= 40.0 {
      Self::Medium
    } else {
      Self::Low
    }
  }
}

/// The facts behind a table's dimension scores.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableDetails {
  pub table_type:           Option<String>,
  pub row_count:            Option<u64>,
  pub table_commented:      bool,
  pub commented_columns:    usize,
  pub total_columns:        usize,
  pub incompatible_columns: Vec<String>,
  pub days_since_altered:   Option<i64>,
  pub clustering_key:       Option<Vec<String>>,
  pub constraint_kinds:     BTreeSet<ConstraintKind>,
  pub active_bytes:         Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReadinessScore {
  #[serde(flatten)]
  pub table:       TableKey,
  pub comments:    f64,
  pub data_types:  f64,
  pub freshness:   f64,
  pub clustering:  f64,
  pub constraints: f64,
  pub total:       f64,
  pub details:     TableDetails,
}

impl TableReadinessScore {
  pub fn band(&self) -> ReadinessBand { ReadinessBand::of(self.total) }

  pub fn dimensions(&self) -> [f64; 5] {
    [
      self.comments,
      self.data_types,
      self.freshness,
      self.clustering,
      self.constraints,
    ]
  }
}

/// Score one table. `now` is the run clock.
pub fn score_table(
  key: &TableKey,
  lookups: &MetadataLookups,
  policy: &TableScoringPolicy,
  now: DateTime<Utc>,
) -> TableReadinessScore {
  let table = lookups.table(key);
  let columns = lookups.columns(key);

  let table_commented = table.is_some_and(|t| t.has_comment());
  let commented_columns = columns.iter().filter(|c| c.has_comment()).count();
  let comments = if table_commented {
    100.0
  } else if columns.is_empty() {
    0.0
  } else {
    100.0 * commented_columns as f64 / columns.len() as f64
  };

  let incompatible_columns: Vec<String> = columns
    .iter()
    .filter(|c| c.type_class() == TypeClass::Incompatible)
    .map(|c| c.column.clone())
    .collect();
  let data_types = if columns.is_empty() {
    0.0
  } else {
    100.0 * (1.0 - incompatible_columns.len() as f64 / columns.len() as f64)
  };

  let days_since_altered = table
    .and_then(|t| t.last_altered)
    .map(|altered| (now - altered).num_days().max(0));
  let freshness = policy.freshness(days_since_altered);

  let clustering = if table.is_some_and(|t| t.is_clustered()) {
    100.0
  } else {
    0.0
  };

  let constraint_kinds = lookups
    .constraints(key)
    .map(|c| c.kinds.clone())
    .unwrap_or_default();
  let constraints = if constraint_kinds.is_empty() { 0.0 } else { 100.0 };

  let w = &policy.weights;
  let total = w.comments * comments
    + w.data_types * data_types
    + w.freshness * freshness
    + w.clustering * clustering
    + w.constraints * constraints;

  TableReadinessScore {
    table: key.clone(),
    comments: round2(comments),
    data_types: round2(data_types),
    freshness: round2(freshness),
    clustering,
    constraints,
    total: round2(total.clamp(0.0, 100.0)),
    details: TableDetails {
      table_type: table.and_then(|t| t.table_type.clone()),
      row_count: table.and_then(|t| t.row_count),
      table_commented,
      commented_columns,
      total_columns: columns.len(),
      incompatible_columns,
      days_since_altered,
      clustering_key: table.and_then(|t| t.clustering_key.clone()),
      constraint_kinds,
      active_bytes: lookups.storage(key).map(|s| s.active_bytes),
    },
  }
}

/// Score every table in the lookups, in key order.
pub fn score_tables(
  lookups: &MetadataLookups,
  policy: &TableScoringPolicy,
  now: DateTime<Utc>,
) -> Vec<TableReadinessScore> {
  lookups
    .table_keys()
    .iter()
    .map(|key| score_table(key, lookups, policy, now))
    .collect()
}

// ─── Candidate policy ────────────────────────────────────────────────────────

fn owned(words: &[&str]) -> Vec<String> {
  words.iter().map(|w| (*w).to_owned()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateScoringPolicy {
  /// Name fragments that signal direct business value.
  pub business_keywords: Vec<String>,
  /// Name fragments that signal personal or secret data.
  pub pii_indicators:    Vec<String>,
}

impl Default for CandidateScoringPolicy {
  fn default() -> Self {
    Self {
      business_keywords: owned(&[
        "CUSTOMER", "ORDER", "SALES", "REVENUE", "PRODUCT", "FEEDBACK",
        "REVIEW", "SUPPORT", "TICKET", "CLAIM",
      ]),
      pii_indicators:    owned(&[
        "EMAIL",
        "SSN",
        "SOCIAL_SECURITY",
        "PHONE",
        "ADDRESS",
        "FIRST_NAME",
        "LAST_NAME",
        "BIRTH",
        "DOB",
        "PASSWORD",
        "SECRET",
        "CREDENTIAL",
      ]),
    }
  }
}

/// Distinct entries of `words` found in `name`, case-insensitively.
fn count_matches(name: &str, words: &[String]) -> usize {
  let name = name.to_ascii_uppercase();
  words
    .iter()
    .map(|w| w.to_ascii_uppercase())
    .filter(|w| !w.is_empty() && name.contains(w.as_str()))
    .collect::<BTreeSet<_>>()
    .len()
}

fn base_potential(feature: AiFeature) -> f64 {
  match feature {
    AiFeature::MlTimeseries => 5.0,
    AiFeature::Llm | AiFeature::SearchRag | AiFeature::DocumentAi => 4.0,
    AiFeature::Extract => 3.0,
  }
}

/// Readiness of one profiled column: null-rate (0–2), content (0–2) and
/// declaration quality (0–1).
pub fn readiness_from_profile(profile: &ColumnProfile) -> f64 {
  let Some(null_pct) = profile.null_pct else {
    return 1.0;
  };
  let nulls = match null_pct {
    p if p <= 10.0 => 2.0,
    p if p <= 30.0 => 1.5,
    p if p <= 50.0 => 1.0,
    p if p <= 70.0 => 0.5,
    _ => 0.0,
  };
  let content = match profile.avg_length {
    Some(len) if len >= 200.0 => 2.0,
    Some(len) if len >= 100.0 => 1.5,
    Some(len) if len >= 50.0 => 1.0,
    Some(len) if len > 0.0 => 0.5,
    _ => 0.0,
  };
  let commented = profile.commented >= 1.0;
  let not_null = profile.is_nullable == Some(false);
  let quality = match (commented, not_null) {
    (true, true) => 1.0,
    (true, false) | (false, true) => 0.5,
    (false, false) => 0.0,
  };
  nulls + content + quality
}

/// Score one candidate.
///
/// `profile` is the candidate's entry from the profiles artifact. Table-level
/// candidates average the readiness of their member columns, estimated with
/// `estimates`.
pub fn score_candidate(
  candidate: &Candidate,
  profile: Option<&ColumnProfile>,
  lookups: &MetadataLookups,
  policy: &CandidateScoringPolicy,
  estimates: &EstimatePolicy,
) -> CandidateScores {
  let table_name = &candidate.table.table;

  let named_for_business = count_matches(table_name, &policy.business_keywords) > 0
    || candidate
      .column
      .as_deref()
      .is_some_and(|c| count_matches(c, &policy.business_keywords) > 0);
  let business_potential = base_potential(candidate.ai_feature)
    + if named_for_business { 0.5 } else { 0.0 };

  let constrained = lookups.has_constraints(&candidate.table);
  let members: Vec<_> = candidate
    .columns()
    .into_iter()
    .filter_map(|name| lookups.column(&candidate.table.column(name)))
    .collect();

  let data_readiness = if candidate.column.is_some() {
    profile
      .filter(|p| p.is_known())
      .map_or(1.0, readiness_from_profile)
  } else if members.is_empty() {
    1.0
  } else {
    members
      .iter()
      .map(|c| readiness_from_profile(&estimates.estimate(c, constrained)))
      .sum::<f64>()
      / members.len() as f64
  };

  let column_comments = if members.is_empty() {
    0.0
  } else {
    members.iter().filter(|c| c.has_comment()).count() as f64
      / members.len() as f64
  };
  let container_commented = match candidate.ai_feature {
    AiFeature::DocumentAi => lookups
      .stages()
      .iter()
      .find(|s| s.key() == candidate.table)
      .is_some_and(|s| has_text(s.comment.as_deref())),
    _ => lookups.table(&candidate.table).is_some_and(|t| t.has_comment()),
  };
  let metadata_quality = 1.0
    + 2.0 * column_comments
    + if container_commented { 2.0 } else { 0.0 };

  let column_risk = match &candidate.column {
    Some(column) => 2.0 * count_matches(column, &policy.pii_indicators) as f64,
    None => members
      .iter()
      .filter(|c| count_matches(&c.column, &policy.pii_indicators) > 0)
      .count() as f64,
  };
  let table_risk = count_matches(table_name, &policy.pii_indicators) as f64;
  let governance_risk = (5.0 - column_risk - table_risk).max(0.0);

  CandidateScores::new(
    business_potential,
    data_readiness,
    metadata_quality,
    governance_risk,
  )
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;
  use crate::{
    catalog::{ColumnMetadata, ConstraintInfo, TableMetadata},
    config::DatabaseScope,
    lookup::Inventory,
  };

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
  }

  fn key() -> TableKey { TableKey::new("DB", "S", "T") }

  fn column(name: &str, ty: &str, comment: Option<&str>) -> ColumnMetadata {
    ColumnMetadata {
      table:                key(),
      column:               name.into(),
      ordinal_position:     0,
      data_type:            ty.into(),
      character_max_length: None,
      numeric_precision:    None,
      numeric_scale:        None,
      is_nullable:          true,
      comment:              comment.map(String::from),
    }
  }

  fn table(altered_days_ago: Option<i64>) -> TableMetadata {
    TableMetadata {
      key:            key(),
      table_type:     Some("BASE TABLE".into()),
      row_count:      Some(10),
      byte_size:      Some(1024),
      comment:        None,
      created_at:     None,
      last_altered:   altered_days_ago.map(|d| now() - Duration::days(d)),
      clustering_key: None,
    }
  }

  fn lookups(table: TableMetadata, columns: Vec<ColumnMetadata>) -> MetadataLookups {
    let inventory = Inventory {
      tables: vec![table],
      columns,
      ..Default::default()
    };
    MetadataLookups::new(&inventory, &DatabaseScope::all())
  }

  #[test]
  fn weights_must_sum_to_one() {
    assert!(TableWeights::default().validate().is_ok());
    let skewed = TableWeights {
      comments: 0.5,
      ..Default::default()
    };
    assert!(matches!(
      skewed.validate(),
      Err(ConfigError::InvalidWeights(sum)) if (sum - 1.25).abs() < 1e-9
    ));
    let negative = TableWeights {
      comments:    -0.25,
      data_types:  0.70,
      ..Default::default()
    };
    assert!(negative.validate().is_err());
  }

  #[test]
  fn freshness_decays_linearly() {
    let policy = TableScoringPolicy::default();
    assert_eq!(policy.freshness(Some(0)), 100.0);
    assert_eq!(policy.freshness(Some(7)), 100.0);
    assert_eq!(policy.freshness(Some(365)), 0.0);
    assert_eq!(policy.freshness(None), 0.0);
    let mid = policy.freshness(Some(186));
    assert!((mid - 50.0).abs() < 0.01, "{mid}");
  }

  #[test]
  fn comments_fall_back_to_column_coverage() {
    let lookups = lookups(table(Some(1)), vec![
      column("A", "VARCHAR", Some("described")),
      column("B", "VARCHAR", None),
      column("C", "GEOGRAPHY", None),
      column("D", "NUMBER", None),
    ]);
    let score = score_table(&key(), &lookups, &TableScoringPolicy::default(), now());
    assert_eq!(score.comments, 25.0);
    assert_eq!(score.data_types, 75.0);
    assert_eq!(score.freshness, 100.0);
    assert_eq!(score.details.incompatible_columns, ["C"]);
    // 0.25*25 + 0.20*75 + 0.25*100
    assert_eq!(score.total, 46.25);
    assert_eq!(score.band(), ReadinessBand::Medium);
  }

  #[test]
  fn one_constraint_kind_already_scores_full_constraints() {
    let with_kinds = |kinds: &[ConstraintKind]| {
      let inventory = Inventory {
        tables: vec![table(Some(1))],
        constraints: vec![ConstraintInfo {
          table: key(),
          kinds: kinds.iter().copied().collect(),
        }],
        ..Default::default()
      };
      let lookups = MetadataLookups::new(&inventory, &DatabaseScope::all());
      score_table(&key(), &lookups, &TableScoringPolicy::default(), now())
        .constraints
    };
    assert_eq!(with_kinds(&[]), 0.0);
    assert_eq!(with_kinds(&[ConstraintKind::PrimaryKey]), 100.0);
    assert_eq!(
      with_kinds(&[
        ConstraintKind::PrimaryKey,
        ConstraintKind::ForeignKey,
        ConstraintKind::Unique,
      ]),
      100.0
    );
  }

  #[test]
  fn table_without_columns_scores_zero_data_types() {
    let lookups = lookups(table(None), vec![]);
    let score = score_table(&key(), &lookups, &TableScoringPolicy::default(), now());
    assert_eq!(score.data_types, 0.0);
    assert_eq!(score.total, 0.0);
  }

  #[test]
  fn pii_in_names_lowers_governance() {
    let mut pii_table = table(Some(1));
    pii_table.key.table = "CUSTOMER_EMAIL_LOG".into();
    let mut pii_column = column("EMAIL_ADDRESS", "VARCHAR", None);
    pii_column.table = pii_table.key.clone();
    let lookups = lookups(pii_table.clone(), vec![pii_column.clone()]);

    let candidate = Candidate::for_column(&pii_column, AiFeature::Llm, "test");
    let scores = score_candidate(
      &candidate,
      None,
      &lookups,
      &CandidateScoringPolicy::default(),
      &EstimatePolicy::default(),
    );
    // Column matches EMAIL and ADDRESS (-4), table matches EMAIL (-1).
    assert_eq!(scores.governance_risk, 0.0);
    // CUSTOMER in the table name.
    assert_eq!(scores.business_potential, 4.5);
    assert_eq!(scores.data_readiness, 1.0);
    assert_eq!(scores.metadata_quality, 1.0);
  }

  #[test]
  fn table_level_candidates_average_member_readiness() {
    let mut constrained = Inventory {
      tables: vec![table(Some(1))],
      columns: vec![
        ColumnMetadata {
          is_nullable: false,
          comment: Some("narrative".into()),
          character_max_length: Some(1000),
          ..column("A", "VARCHAR", None)
        },
        ColumnMetadata {
          character_max_length: Some(100),
          ..column("B", "VARCHAR", None)
        },
      ],
      ..Default::default()
    };
    constrained.constraints.push(ConstraintInfo {
      table: key(),
      kinds: BTreeSet::from([ConstraintKind::PrimaryKey]),
    });
    let lookups = MetadataLookups::new(&constrained, &DatabaseScope::all());
    let candidate = Candidate::for_table(
      key(),
      AiFeature::SearchRag,
      "test",
      vec!["A".into(), "B".into()],
    );
    let scores = score_candidate(
      &candidate,
      None,
      &lookups,
      &CandidateScoringPolicy::default(),
      &EstimatePolicy::default(),
    );
    // A: 2 + 2 + 1 = 5; B (20% nulls, 30 chars): 1.5 + 0.5 + 0 = 2.
    assert_eq!(scores.data_readiness, 3.5);
    // Half the members commented.
    assert_eq!(scores.metadata_quality, 2.0);
  }
}
