//! Candidates: columns, tables or stages flagged for an AI feature.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
  catalog::{ColumnMetadata, TableKey},
  round2,
};

// ─── Features ────────────────────────────────────────────────────────────────

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
  strum::EnumString,
  strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AiFeature {
  /// Summarisation, classification and other prompting over long text.
  Llm,
  /// Semantic search over several text columns of one table.
  SearchRag,
  /// Forecasting over a time column and numeric measures.
  MlTimeseries,
  /// Structured extraction from semi-structured documents.
  Extract,
  /// Document processing over files in a stage.
  DocumentAi,
}

impl AiFeature {
  /// Table-level features carry member columns instead of a single column.
  pub fn is_table_level(self) -> bool {
    matches!(self, Self::SearchRag | Self::MlTimeseries | Self::DocumentAi)
  }

  /// Features whose usefulness depends on the amount of text per row.
  pub fn is_text(self) -> bool { matches!(self, Self::Llm | Self::SearchRag) }
}

// ─── Keys ────────────────────────────────────────────────────────────────────

/// What a candidate points at inside its table.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum CandidateTarget {
  Column { column: String },
  Table { feature: AiFeature },
}

/// Identity of a candidate across runs.
///
/// Column-level candidates are keyed by column; table-level candidates by
/// feature, so a table can hold both a `SEARCH_RAG` and an `ML_TIMESERIES`
/// candidate. DOCUMENT_AI candidates use the stage name as `table`.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CandidateKey {
  #[serde(flatten)]
  pub table:  TableKey,
  #[serde(flatten)]
  pub target: CandidateTarget,
}

impl CandidateKey {
  pub fn database(&self) -> &str { &self.table.database }
}

impl fmt::Display for CandidateKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.target {
      CandidateTarget::Column { column } => write!(f, "{}.{column}", self.table),
      CandidateTarget::Table { feature } => {
        write!(f, "{}[{feature}]", self.table)
      }
    }
  }
}

// ─── Scores ──────────────────────────────────────────────────────────────────

/// Four dimensions in `[0, 5]` and their sum in `[0, 20]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScores {
  pub business_potential: f64,
  pub data_readiness:     f64,
  pub metadata_quality:   f64,
  pub governance_risk:    f64,
  pub total:              f64,
}

impl CandidateScores {
  pub const DIMENSION_MAX: f64 = 5.0;
  pub const TOTAL_MAX: f64 = 20.0;

  /// Clamp each dimension into range, round to two places, and total.
  pub fn new(
    business_potential: f64,
    data_readiness: f64,
    metadata_quality: f64,
    governance_risk: f64,
  ) -> Self {
    let dim = |v: f64| round2(v.clamp(0.0, Self::DIMENSION_MAX));
    let (bp, dr, mq, gr) = (
      dim(business_potential),
      dim(data_readiness),
      dim(metadata_quality),
      dim(governance_risk),
    );
    Self {
      business_potential: bp,
      data_readiness:     dr,
      metadata_quality:   mq,
      governance_risk:    gr,
      total:              round2(bp + dr + mq + gr),
    }
  }
}

// ─── Candidate ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
  #[serde(flatten)]
  pub table:                TableKey,
  /// Set for column-level features only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub column:               Option<String>,
  pub ai_feature:           AiFeature,
  pub detection_reason:     String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data_type:            Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_length:           Option<u64>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub member_columns:       Vec<String>,
  #[serde(default)]
  pub is_confirmed:         bool,
  #[serde(default)]
  pub confirmation_reasons: Vec<String>,
  #[serde(default)]
  pub scores:               Option<CandidateScores>,
}

impl Candidate {
  /// A single-column candidate.
  pub fn for_column(
    column: &ColumnMetadata,
    ai_feature: AiFeature,
    detection_reason: impl Into<String>,
  ) -> Self {
    Self {
      table: column.table.clone(),
      column: Some(column.column.clone()),
      ai_feature,
      detection_reason: detection_reason.into(),
      data_type: Some(column.data_type.clone()),
      max_length: column.character_max_length,
      member_columns: Vec::new(),
      is_confirmed: false,
      confirmation_reasons: Vec::new(),
      scores: None,
    }
  }

  /// A table-level candidate over `member_columns`.
  pub fn for_table(
    table: TableKey,
    ai_feature: AiFeature,
    detection_reason: impl Into<String>,
    member_columns: Vec<String>,
  ) -> Self {
    Self {
      table,
      column: None,
      ai_feature,
      detection_reason: detection_reason.into(),
      data_type: None,
      max_length: None,
      member_columns,
      is_confirmed: false,
      confirmation_reasons: Vec::new(),
      scores: None,
    }
  }

  pub fn key(&self) -> CandidateKey {
    let target = match &self.column {
      Some(column) => CandidateTarget::Column {
        column: column.clone(),
      },
      None => CandidateTarget::Table {
        feature: self.ai_feature,
      },
    };
    CandidateKey {
      table: self.table.clone(),
      target,
    }
  }

  pub fn database(&self) -> &str { &self.table.database }

  /// The column names this candidate draws on: its own column, or its
  /// members.
  pub fn columns(&self) -> Vec<&str> {
    match &self.column {
      Some(column) => vec![column.as_str()],
      None => self.member_columns.iter().map(String::as_str).collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn feature_names_match_wire_form() {
    assert_eq!(AiFeature::SearchRag.to_string(), "SEARCH_RAG");
    assert_eq!(AiFeature::MlTimeseries.to_string(), "ML_TIMESERIES");
    assert_eq!("document_ai".parse::<AiFeature>(), Ok(AiFeature::DocumentAi));
    assert_eq!(
      serde_json::to_string(&AiFeature::Llm).unwrap(),
      "\"LLM\""
    );
  }

  #[test]
  fn keys_distinguish_columns_and_table_features() {
    let table = TableKey::new("DB", "S", "T");
    let search = Candidate::for_table(
      table.clone(),
      AiFeature::SearchRag,
      "two text columns",
      vec!["A".into(), "B".into()],
    );
    let series = Candidate::for_table(
      table,
      AiFeature::MlTimeseries,
      "date and measure",
      vec!["D".into(), "M".into()],
    );
    assert_ne!(search.key(), series.key());
    assert_eq!(search.key().to_string(), "DB.S.T[SEARCH_RAG]");
  }

  #[test]
  fn key_serialises_flat() {
    let key = CandidateKey {
      table:  TableKey::new("DB", "S", "T"),
      target: CandidateTarget::Column {
        column: "BODY".into(),
      },
    };
    let json = serde_json::to_value(&key).unwrap();
    assert_eq!(
      json,
      serde_json::json!({
        "database": "DB",
        "schema": "S",
        "table": "T",
        "level": "column",
        "column": "BODY",
      })
    );
    let back: CandidateKey = serde_json::from_value(json).unwrap();
    assert_eq!(back, key);
  }

  #[test]
  fn scores_clamp_round_and_total() {
    let scores = CandidateScores::new(5.5, 2.333, 1.0, -1.0);
    assert_eq!(scores.business_potential, 5.0);
    assert_eq!(scores.data_readiness, 2.33);
    assert_eq!(scores.governance_risk, 0.0);
    assert_eq!(scores.total, 8.33);
  }
}
