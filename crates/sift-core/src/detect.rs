//! Candidate identification.
//!
//! Rules run in a fixed order over each table's columns:
//!
//! 1. `EXTRACT`: semi-structured column.
//! 2. `LLM`: text column that is long enough or has a telling name. A column
//!    already claimed by `EXTRACT` is never considered.
//! 3. `SEARCH_RAG`: enough `LLM`-qualifying columns in one table.
//! 4. `ML_TIMESERIES`: a temporal column next to at least one numeric measure.
//! 5. `DOCUMENT_AI`: one candidate per stage.
//!
//! Detection never looks at data, only at names and declared types.

use serde::{Deserialize, Serialize};

use crate::{
  candidate::{AiFeature, Candidate},
  catalog::{ColumnMetadata, TypeClass},
  error::ConfigError,
  lookup::MetadataLookups,
};

fn default_text_keywords() -> Vec<String> {
  [
    "DESCRIPTION",
    "CONTENT",
    "MESSAGE",
    "NOTE",
    "SUMMARY",
    "DETAIL",
    "BODY",
    "TEXT",
    "COMMENT",
    "FEEDBACK",
    "REVIEW",
    "ABSTRACT",
    "BIO",
    "NARRATIVE",
    "TITLE",
    "SUBJECT",
  ]
  .map(String::from)
  .to_vec()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionRules {
  /// Declared length at which a text column counts as long-form.
  pub min_text_length:             u64,
  /// Name fragments that mark a text column as prose regardless of length.
  pub text_keywords:               Vec<String>,
  pub min_text_columns_for_search: usize,
  /// Cap on numeric measures listed as `ML_TIMESERIES` members.
  pub max_timeseries_measures:     usize,
}

impl Default for DetectionRules {
  fn default() -> Self {
    Self {
      min_text_length:             500,
      text_keywords:               default_text_keywords(),
      min_text_columns_for_search: 2,
      max_timeseries_measures:     5,
    }
  }
}

impl DetectionRules {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.min_text_columns_for_search == 0 {
      return Err(ConfigError::OutOfRange {
        name:  "detection.min_text_columns_for_search",
        value: 0.0,
        min:   1.0,
        max:   f64::from(u32::MAX),
      });
    }
    if self.max_timeseries_measures == 0 {
      return Err(ConfigError::OutOfRange {
        name:  "detection.max_timeseries_measures",
        value: 0.0,
        min:   1.0,
        max:   f64::from(u32::MAX),
      });
    }
    Ok(())
  }

  /// Why a text column qualifies for `LLM`, if it does.
  fn llm_reason(&self, column: &ColumnMetadata) -> Option<String> {
    if column
      .character_max_length
      .is_some_and(|len| len >= self.min_text_length)
    {
      return Some(format!(
        "Long text column ({}, max length {})",
        column.data_type,
        column.character_max_length.unwrap_or_default()
      ));
    }
    let name = column.column.to_ascii_uppercase();
    self
      .text_keywords
      .iter()
      .find(|kw| name.contains(&kw.to_ascii_uppercase()))
      .map(|kw| {
        format!(
          "Text column ({}) named like prose ({})",
          column.data_type,
          kw.to_ascii_uppercase()
        )
      })
  }
}

/// `ID`, `*_ID` and `*_KEY` columns are identifiers, not measures.
fn is_identifier_like(name: &str) -> bool {
  let name = name.to_ascii_uppercase();
  name == "ID" || name.ends_with("_ID") || name.ends_with("_KEY")
}

/// Run every rule over the lookups. Output is sorted by candidate key.
pub fn identify(
  lookups: &MetadataLookups,
  rules: &DetectionRules,
) -> Vec<Candidate> {
  let mut candidates = Vec::new();

  for key in lookups.table_keys() {
    let columns = lookups.columns(key);
    let mut text_columns = Vec::new();

    for column in columns {
      match column.type_class() {
        TypeClass::SemiStructured => candidates.push(Candidate::for_column(
          column,
          AiFeature::Extract,
          format!("Semi-structured {} column", column.data_type),
        )),
        TypeClass::Text => {
          if let Some(reason) = rules.llm_reason(column) {
            text_columns.push(column.column.clone());
            candidates.push(Candidate::for_column(
              column,
              AiFeature::Llm,
              reason,
            ));
          }
        }
        _ => {}
      }
    }

    if text_columns.len() >= rules.min_text_columns_for_search {
      candidates.push(Candidate::for_table(
        key.clone(),
        AiFeature::SearchRag,
        format!("{} text columns suitable for retrieval", text_columns.len()),
        text_columns,
      ));
    }

    let temporal: Vec<&ColumnMetadata> = columns
      .iter()
      .filter(|c| c.type_class() == TypeClass::Temporal)
      .collect();
    let measures: Vec<&ColumnMetadata> = columns
      .iter()
      .filter(|c| {
        c.type_class() == TypeClass::Numeric && !is_identifier_like(&c.column)
      })
      .collect();
    if !temporal.is_empty() && !measures.is_empty() {
      let reason = format!(
        "{} temporal and {} numeric measure columns",
        temporal.len(),
        measures.len()
      );
      let members = temporal
        .iter()
        .chain(measures.iter().take(rules.max_timeseries_measures))
        .map(|c| c.column.clone())
        .collect();
      candidates.push(Candidate::for_table(
        key.clone(),
        AiFeature::MlTimeseries,
        reason,
        members,
      ));
    }
  }

  for stage in lookups.stages() {
    let reason = match stage.url.as_deref() {
      Some(url) if stage.is_external() => {
        format!("External stage at {url} holding files for document processing")
      }
      _ if stage.is_external() => {
        "External stage holding files for document processing".to_owned()
      }
      _ => "Internal stage holding files for document processing".to_owned(),
    };
    candidates.push(Candidate::for_table(
      stage.key(),
      AiFeature::DocumentAi,
      reason,
      Vec::new(),
    ));
  }

  candidates.sort_by_cached_key(Candidate::key);
  candidates
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    catalog::{StageEntry, TableKey},
    config::DatabaseScope,
    lookup::Inventory,
  };

  fn column(table: &str, name: &str, ty: &str, len: Option<u64>) -> ColumnMetadata {
    ColumnMetadata {
      table:                TableKey::new("DB", "S", table),
      column:               name.into(),
      ordinal_position:     0,
      data_type:            ty.into(),
      character_max_length: len,
      numeric_precision:    None,
      numeric_scale:        None,
      is_nullable:          true,
      comment:              None,
    }
  }

  fn lookups(columns: Vec<ColumnMetadata>, stages: Vec<StageEntry>) -> MetadataLookups {
    let inventory = Inventory {
      columns,
      stages,
      ..Default::default()
    };
    MetadataLookups::new(&inventory, &DatabaseScope::all())
  }

  fn features(candidates: &[Candidate]) -> Vec<(Option<&str>, AiFeature)> {
    candidates
      .iter()
      .map(|c| (c.column.as_deref(), c.ai_feature))
      .collect()
  }

  #[test]
  fn long_text_and_prose_names_qualify_for_llm() {
    let found = identify(
      &lookups(
        vec![
          column("T", "BODY_TEXT", "VARCHAR", Some(16_777_216)),
          column("T", "CODE", "VARCHAR", Some(10)),
          column("T", "SHORT_NOTE", "VARCHAR", Some(40)),
        ],
        vec![],
      ),
      &DetectionRules::default(),
    );
    assert_eq!(
      features(&found),
      [
        (Some("BODY_TEXT"), AiFeature::Llm),
        (Some("SHORT_NOTE"), AiFeature::Llm),
        (None, AiFeature::SearchRag),
      ]
    );
    let search = &found[2];
    assert_eq!(search.member_columns, ["BODY_TEXT", "SHORT_NOTE"]);
  }

  #[test]
  fn extract_wins_over_llm() {
    // A VARIANT named like prose is EXTRACT only; VARIANT is not a text type.
    let found = identify(
      &lookups(vec![column("T", "PAYLOAD_TEXT", "VARIANT", None)], vec![]),
      &DetectionRules::default(),
    );
    assert_eq!(features(&found), [(Some("PAYLOAD_TEXT"), AiFeature::Extract)]);
  }

  #[test]
  fn timeseries_skips_identifier_columns() {
    let found = identify(
      &lookups(
        vec![
          column("SALES", "SOLD_AT", "TIMESTAMP_NTZ", None),
          column("SALES", "ID", "NUMBER", None),
          column("SALES", "STORE_ID", "NUMBER", None),
          column("SALES", "AMOUNT", "NUMBER", None),
        ],
        vec![],
      ),
      &DetectionRules::default(),
    );
    assert_eq!(features(&found), [(None, AiFeature::MlTimeseries)]);
    assert_eq!(found[0].member_columns, ["SOLD_AT", "AMOUNT"]);

    let ids_only = identify(
      &lookups(
        vec![
          column("T", "DAY", "DATE", None),
          column("T", "ORDER_KEY", "NUMBER", None),
        ],
        vec![],
      ),
      &DetectionRules::default(),
    );
    assert!(ids_only.is_empty());
  }

  #[test]
  fn stages_become_document_candidates() {
    let stage = StageEntry {
      database:   "DB".into(),
      schema:     "S".into(),
      stage:      "CONTRACTS".into(),
      url:        Some("s3://bucket/contracts/".into()),
      stage_type: Some("External Named".into()),
      comment:    None,
    };
    let found = identify(&lookups(vec![], vec![stage]), &DetectionRules::default());
    assert_eq!(features(&found), [(None, AiFeature::DocumentAi)]);
    assert_eq!(found[0].table.table, "CONTRACTS");
    assert!(found[0].detection_reason.contains("s3://bucket/contracts/"));
  }

  #[test]
  fn output_is_sorted_by_key() {
    let found = identify(
      &lookups(
        vec![
          column("B", "DESCRIPTION", "TEXT", None),
          column("A", "DESCRIPTION", "TEXT", None),
        ],
        vec![],
      ),
      &DetectionRules::default(),
    );
    let tables: Vec<_> = found.iter().map(|c| c.table.table.as_str()).collect();
    assert_eq!(tables, ["A", "B"]);
  }
}
