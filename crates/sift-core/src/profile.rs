//! Metadata-only column profiles.
//!
//! Without reading rows, sparsity and content length can only be estimated
//! from declared metadata. The assumptions behind those estimates live in
//! [`EstimatePolicy`] so they can be tuned per environment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
  candidate::{AiFeature, Candidate, CandidateKey},
  catalog::{ColumnMetadata, TypeClass},
  error::ConfigError,
  lookup::MetadataLookups,
  round2,
};

/// Assumptions used to turn declarations into estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatePolicy {
  /// Null percentage assumed for a nullable column in a table that declares
  /// at least one constraint.
  pub nullable_null_pct:      f64,
  /// Null percentage assumed for a nullable column in a table with no
  /// declared constraints.
  pub unconstrained_null_pct: f64,
  /// Fraction of the declared maximum length a text value is assumed to use.
  pub avg_length_ratio:       f64,
  /// Ceiling on the estimated average length.
  pub avg_length_cap:         f64,
  /// Average length assumed for text columns with no declared length.
  pub unknown_length_avg:     f64,
}

impl Default for EstimatePolicy {
  fn default() -> Self {
    Self {
      nullable_null_pct:      20.0,
      unconstrained_null_pct: 40.0,
      avg_length_ratio:       0.3,
      avg_length_cap:         5000.0,
      unknown_length_avg:     100.0,
    }
  }
}

fn check_range(
  name: &'static str,
  value: f64,
  min: f64,
  max: f64,
) -> Result<(), ConfigError> {
  if (min..=max).contains(&value) {
    Ok(())
  } else {
    Err(ConfigError::OutOfRange {
      name,
      value,
      min,
      max,
    })
  }
}

impl EstimatePolicy {
  pub fn validate(&self) -> Result<(), ConfigError> {
    check_range(
      "estimates.nullable_null_pct",
      self.nullable_null_pct,
      0.0,
      100.0,
    )?;
    check_range(
      "estimates.unconstrained_null_pct",
      self.unconstrained_null_pct,
      0.0,
      100.0,
    )?;
    check_range("estimates.avg_length_ratio", self.avg_length_ratio, 0.0, 1.0)?;
    check_range(
      "estimates.avg_length_cap",
      self.avg_length_cap,
      0.0,
      f64::MAX,
    )?;
    check_range(
      "estimates.unknown_length_avg",
      self.unknown_length_avg,
      0.0,
      f64::MAX,
    )
  }

  /// Estimate the profile of a single column.
  pub fn estimate(
    &self,
    column: &ColumnMetadata,
    table_constrained: bool,
  ) -> ColumnProfile {
    let null_pct = match (column.is_nullable, table_constrained) {
      (false, _) => 0.0,
      (true, true) => self.nullable_null_pct,
      (true, false) => self.unconstrained_null_pct,
    };
    let avg_length = match column.type_class() {
      TypeClass::Text => Some(match column.character_max_length {
        Some(max) => (max as f64 * self.avg_length_ratio).min(self.avg_length_cap),
        None => self.unknown_length_avg,
      }),
      _ => None,
    };
    ColumnProfile {
      null_pct:    Some(round2(null_pct)),
      avg_length:  avg_length.map(round2),
      max_length:  column.character_max_length,
      is_nullable: Some(column.is_nullable),
      commented:   if column.has_comment() { 1.0 } else { 0.0 },
    }
  }
}

/// Estimated shape of a candidate's data. For table-level candidates the
/// figures are averages over member columns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnProfile {
  /// Estimated percentage of NULL values; `None` when nothing is known.
  pub null_pct:    Option<f64>,
  /// Estimated average content length, for text columns.
  pub avg_length:  Option<f64>,
  pub max_length:  Option<u64>,
  /// `None` for table-level candidates with mixed or unknown members.
  pub is_nullable: Option<bool>,
  /// Fraction of the profiled columns that carry a comment.
  pub commented:   f64,
}

impl ColumnProfile {
  /// Whether anything at all was estimated.
  pub fn is_known(&self) -> bool { self.null_pct.is_some() }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
  let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
  (count > 0).then(|| round2(sum / count as f64))
}

/// Profile one candidate from the lookups.
pub fn profile_candidate(
  candidate: &Candidate,
  lookups: &MetadataLookups,
  policy: &EstimatePolicy,
) -> ColumnProfile {
  if candidate.ai_feature == AiFeature::DocumentAi {
    return ColumnProfile::default();
  }
  let constrained = lookups.has_constraints(&candidate.table);
  let members: Vec<ColumnProfile> = candidate
    .columns()
    .into_iter()
    .filter_map(|name| lookups.column(&candidate.table.column(name)))
    .map(|column| policy.estimate(column, constrained))
    .collect();

  match members.as_slice() {
    [] => ColumnProfile::default(),
    [single] if candidate.column.is_some() => single.clone(),
    many => {
      let nullability = many.iter().map(|p| p.is_nullable).collect::<Vec<_>>();
      ColumnProfile {
        null_pct:    mean(many.iter().filter_map(|p| p.null_pct)),
        avg_length:  mean(many.iter().filter_map(|p| p.avg_length)),
        max_length:  many.iter().filter_map(|p| p.max_length).max(),
        is_nullable: nullability
          .first()
          .copied()
          .flatten()
          .filter(|first| nullability.iter().all(|n| *n == Some(*first))),
        commented:   mean(many.iter().map(|p| p.commented)).unwrap_or(0.0),
      }
    }
  }
}

// ─── Artifact ────────────────────────────────────────────────────────────────

/// On-disk form of one profile: the candidate key flattened beside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
  #[serde(flatten)]
  pub key:     CandidateKey,
  pub profile: ColumnProfile,
}

/// Profiles of every detected candidate, by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ProfileRecord>", into = "Vec<ProfileRecord>")]
pub struct ColumnProfiles(BTreeMap<CandidateKey, ColumnProfile>);

impl From<Vec<ProfileRecord>> for ColumnProfiles {
  fn from(records: Vec<ProfileRecord>) -> Self {
    Self(records.into_iter().map(|r| (r.key, r.profile)).collect())
  }
}

impl From<ColumnProfiles> for Vec<ProfileRecord> {
  fn from(profiles: ColumnProfiles) -> Self {
    profiles
      .0
      .into_iter()
      .map(|(key, profile)| ProfileRecord { key, profile })
      .collect()
  }
}

impl ColumnProfiles {
  /// Profile every candidate.
  pub fn build(
    candidates: &[Candidate],
    lookups: &MetadataLookups,
    policy: &EstimatePolicy,
  ) -> Self {
    Self(
      candidates
        .iter()
        .map(|c| (c.key(), profile_candidate(c, lookups, policy)))
        .collect(),
    )
  }

  pub fn get(&self, key: &CandidateKey) -> Option<&ColumnProfile> {
    self.0.get(key)
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::TableKey;

  fn text(len: Option<u64>, nullable: bool) -> ColumnMetadata {
    ColumnMetadata {
      table:                TableKey::new("DB", "S", "T"),
      column:               "BODY".into(),
      ordinal_position:     1,
      data_type:            "VARCHAR".into(),
      character_max_length: len,
      numeric_precision:    None,
      numeric_scale:        None,
      is_nullable:          nullable,
      comment:              None,
    }
  }

  #[test]
  fn not_null_columns_estimate_zero_nulls() {
    let profile = EstimatePolicy::default().estimate(&text(Some(100), false), false);
    assert_eq!(profile.null_pct, Some(0.0));
    assert_eq!(profile.avg_length, Some(30.0));
  }

  #[test]
  fn nullable_estimate_depends_on_constraints() {
    let policy = EstimatePolicy::default();
    let column = text(None, true);
    assert_eq!(policy.estimate(&column, true).null_pct, Some(20.0));
    assert_eq!(policy.estimate(&column, false).null_pct, Some(40.0));
    assert_eq!(policy.estimate(&column, true).avg_length, Some(100.0));
  }

  #[test]
  fn average_length_is_capped() {
    let profile =
      EstimatePolicy::default().estimate(&text(Some(16_777_216), true), true);
    assert_eq!(profile.avg_length, Some(5000.0));
  }

  #[test]
  fn non_text_columns_have_no_length_estimate() {
    let mut column = text(None, true);
    column.data_type = "NUMBER".into();
    let profile = EstimatePolicy::default().estimate(&column, true);
    assert_eq!(profile.avg_length, None);
  }

  #[test]
  fn policy_rejects_out_of_range_values() {
    let policy = EstimatePolicy {
      nullable_null_pct: 120.0,
      ..Default::default()
    };
    assert!(matches!(
      policy.validate(),
      Err(ConfigError::OutOfRange {
        name: "estimates.nullable_null_pct",
        ..
      })
    ));
  }
}
