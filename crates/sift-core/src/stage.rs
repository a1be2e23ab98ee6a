//! The fixed stage sequence of a run.
//!
//! Stages form a total order; declaration order is execution order. Each
//! stage declares the artifacts it needs and the artifacts it writes, which
//! is all the orchestrator needs to know to resume from any of them.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::{artifact::ArtifactKind, error::ConfigError};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  /// Fetch catalog rows and build the inventory.
  Discover,
  /// Naming and type heuristics produce raw candidates.
  Identify,
  /// Metadata-derived estimates per candidate.
  Profile,
  /// Per-table composite readiness.
  TableReadiness,
  /// Per-candidate composite score, through the analysis cache.
  Score,
  /// Threshold policy: confirmed vs potential.
  Confirm,
  /// Write back the analysis cache.
  SaveCache,
  /// Fold this run's candidates into the cumulative set.
  Merge,
  /// Confirmed set and run summary.
  Publish,
}

impl Stage {
  pub const FIRST: Self = Self::Discover;
  pub const LAST: Self = Self::Publish;

  /// Short checkpoint label used on the command line and in logs.
  pub fn label(self) -> &'static str {
    match self {
      Self::Discover => "1",
      Self::Identify => "2",
      Self::Profile => "2A",
      Self::TableReadiness => "2B",
      Self::Score => "2C",
      Self::Confirm => "2D",
      Self::SaveCache => "2E",
      Self::Merge => "3",
      Self::Publish => "4",
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Discover => "discover",
      Self::Identify => "identify",
      Self::Profile => "profile",
      Self::TableReadiness => "table_readiness",
      Self::Score => "score",
      Self::Confirm => "confirm",
      Self::SaveCache => "save_cache",
      Self::Merge => "merge",
      Self::Publish => "publish",
    }
  }

  /// Artifacts this stage reads. On resume, any of these not produced
  /// earlier in the same run are loaded from the store.
  ///
  /// The prior candidate set is only read in append mode; the orchestrator
  /// handles that case itself, so it is not listed here.
  pub fn requires(self) -> &'static [ArtifactKind] {
    use ArtifactKind::*;
    match self {
      Self::Discover => &[],
      Self::Identify => &[Inventory],
      Self::Profile => &[Inventory, DetectedCandidates],
      Self::TableReadiness => &[Inventory],
      Self::Score => {
        &[Inventory, DetectedCandidates, ColumnProfiles, AnalysisCache]
      }
      Self::Confirm => &[ScoredCandidates, ColumnProfiles],
      Self::SaveCache => {
        &[Inventory, ScoredCandidates, ColumnProfiles, AnalysisCache]
      }
      Self::Merge => &[Inventory, ConfirmedCandidates, RunHistory],
      Self::Publish => &[CandidateSet, TableScores],
    }
  }

  pub fn produces(self) -> &'static [ArtifactKind] {
    use ArtifactKind::*;
    match self {
      Self::Discover => &[Inventory],
      Self::Identify => &[DetectedCandidates],
      Self::Profile => &[ColumnProfiles],
      Self::TableReadiness => &[TableScores],
      Self::Score => &[ScoredCandidates],
      Self::Confirm => &[ConfirmedCandidates],
      Self::SaveCache => &[AnalysisCache],
      Self::Merge => &[CandidateSet, RunHistory],
      Self::Publish => &[ConfirmedSet, RunSummary],
    }
  }

  /// All stages in execution order.
  pub fn all() -> impl Iterator<Item = Self> { Self::iter() }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.label(), self.name())
  }
}

impl FromStr for Stage {
  type Err = ConfigError;

  /// Accepts either the label (`2c`) or the name (`Score`, `save-cache`),
  /// case-insensitively.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
    Self::iter()
      .find(|stage| {
        stage.label().eq_ignore_ascii_case(&wanted) || stage.name() == wanted
      })
      .ok_or_else(|| ConfigError::UnknownStage(s.to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn labels_and_names_parse_case_insensitively() {
    assert_eq!("2c".parse::<Stage>(), Ok(Stage::Score));
    assert_eq!("2C".parse::<Stage>(), Ok(Stage::Score));
    assert_eq!("Score".parse::<Stage>(), Ok(Stage::Score));
    assert_eq!("save-cache".parse::<Stage>(), Ok(Stage::SaveCache));
    assert_eq!("1".parse::<Stage>(), Ok(Stage::Discover));
    assert_eq!(
      "2F".parse::<Stage>(),
      Err(ConfigError::UnknownStage("2F".into()))
    );
  }

  #[test]
  fn order_is_declaration_order() {
    let stages: Vec<_> = Stage::all().collect();
    assert_eq!(stages.first(), Some(&Stage::FIRST));
    assert_eq!(stages.last(), Some(&Stage::LAST));
    assert!(stages.windows(2).all(|w| w[0] < w[1]));
    assert!(Stage::Profile < Stage::TableReadiness);
    assert!(Stage::SaveCache < Stage::Merge);
  }

  #[test]
  fn every_requirement_is_produced_by_an_earlier_stage() {
    for stage in Stage::all() {
      for kind in stage.requires() {
        // The analysis cache and run history also survive across runs.
        if matches!(kind, ArtifactKind::AnalysisCache | ArtifactKind::RunHistory)
        {
          continue;
        }
        assert!(
          Stage::all()
            .take_while(|s| *s < stage)
            .any(|s| s.produces().contains(kind)),
          "{kind} required by {stage} is never produced before it"
        );
      }
    }
  }
}
