//! Persisted artifacts: the checkpoint contract between stages.
//!
//! Every artifact is a JSON document with a fixed kind. Stages write their
//! outputs once, at completion; a resumed run reads back whatever it did not
//! produce itself.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use strum::IntoEnumIterator;

use crate::{
  cache::AnalysisCache, candidate::Candidate, history::RunHistory,
  lookup::Inventory, merge::CandidateSet, profile::ColumnProfiles,
  report::RunSummary, score::TableReadinessScore,
};

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
  strum::Display,
  strum::EnumIter,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactKind {
  /// Every in-scope table, column, constraint, storage row and stage.
  Inventory,
  DetectedCandidates,
  ColumnProfiles,
  TableScores,
  ScoredCandidates,
  /// This run's candidates after the confirmation policy.
  ConfirmedCandidates,
  AnalysisCache,
  /// The cumulative, merged candidate set.
  CandidateSet,
  RunHistory,
  /// Confirmed members of the cumulative set.
  ConfirmedSet,
  RunSummary,
}

impl ArtifactKind {
  pub fn all() -> impl Iterator<Item = Self> { Self::iter() }
}

/// A typed artifact document.
///
/// `Default` is the substitute used when a resumed stage finds the artifact
/// missing.
pub trait Artifact: Serialize + DeserializeOwned + Default {
  const KIND: ArtifactKind;
}

/// Serialise an artifact to the bytes every store writes: pretty JSON with a
/// trailing newline.
pub fn encode<A: Artifact>(artifact: &A) -> serde_json::Result<Vec<u8>> {
  let mut bytes = serde_json::to_vec_pretty(artifact)?;
  bytes.push(b'\n');
  Ok(bytes)
}

pub fn decode<A: Artifact>(bytes: &[u8]) -> serde_json::Result<A> {
  serde_json::from_slice(bytes)
}

// ─── Candidate lists ─────────────────────────────────────────────────────────

/// Raw detector output, sorted by candidate key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectedCandidates(pub Vec<Candidate>);

/// Detected candidates with scores attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoredCandidates(pub Vec<Candidate>);

/// Scored candidates with the confirmation decision and reasons attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmedCandidates(pub Vec<Candidate>);

/// The confirmed subset of the cumulative candidate set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmedSet(pub Vec<Candidate>);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableScores(pub Vec<TableReadinessScore>);

macro_rules! artifact {
  ($($ty:ty => $kind:ident),* $(,)?) => {
    $(impl Artifact for $ty {
      const KIND: ArtifactKind = ArtifactKind::$kind;
    })*
  };
}

artifact! {
  Inventory           => Inventory,
  DetectedCandidates  => DetectedCandidates,
  ColumnProfiles      => ColumnProfiles,
  TableScores         => TableScores,
  ScoredCandidates    => ScoredCandidates,
  ConfirmedCandidates => ConfirmedCandidates,
  AnalysisCache       => AnalysisCache,
  CandidateSet        => CandidateSet,
  RunHistory          => RunHistory,
  ConfirmedSet        => ConfirmedSet,
  RunSummary          => RunSummary,
}
