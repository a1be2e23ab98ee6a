//! The inbound boundary: raw catalog rows and the trait that fetches them.
//!
//! Sources hand back flat records whose fields are all optional, mirroring the
//! catalog views they come from. Conversion into the typed entities of
//! [`crate::catalog`] happens here and nowhere else; a row that cannot be
//! converted yields a [`RowDefect`] which the lookup builder logs and skips.

use std::convert::Infallible;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

use crate::{
  catalog::{
    ColumnMetadata, ConstraintKind, StageEntry, StorageMetrics, TableKey,
    TableMetadata,
  },
  config::DatabaseScope,
};

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A row of the tables view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTableRow {
  pub database:       Option<String>,
  pub schema:         Option<String>,
  pub table:          Option<String>,
  pub table_type:     Option<String>,
  pub row_count:      Option<i64>,
  pub bytes:          Option<i64>,
  pub comment:        Option<String>,
  pub created:        Option<String>,
  pub last_altered:   Option<String>,
  pub clustering_key: Option<String>,
  pub deleted:        Option<String>,
}

/// A row of the columns view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawColumnRow {
  pub database:             Option<String>,
  pub schema:               Option<String>,
  pub table:                Option<String>,
  pub column:               Option<String>,
  pub ordinal_position:     Option<i64>,
  pub data_type:            Option<String>,
  pub character_max_length: Option<i64>,
  pub numeric_precision:    Option<i64>,
  pub numeric_scale:        Option<i64>,
  pub is_nullable:          Option<String>,
  pub comment:              Option<String>,
  pub deleted:              Option<String>,
}

/// A row of the table-constraints view; one row per declared constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawConstraintRow {
  pub database:        Option<String>,
  pub schema:          Option<String>,
  pub table:           Option<String>,
  pub constraint_name: Option<String>,
  pub constraint_type: Option<String>,
  pub deleted:         Option<String>,
}

/// A row of the table-storage-metrics view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStorageRow {
  pub database:                 Option<String>,
  pub schema:                   Option<String>,
  pub table:                    Option<String>,
  pub active_bytes:             Option<i64>,
  pub time_travel_bytes:        Option<i64>,
  pub failsafe_bytes:           Option<i64>,
  pub retained_for_clone_bytes: Option<i64>,
  pub deleted:                  Option<String>,
}

/// A row of the stages view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStageRow {
  pub database:   Option<String>,
  pub schema:     Option<String>,
  pub stage:      Option<String>,
  pub url:        Option<String>,
  pub stage_type: Option<String>,
  pub comment:    Option<String>,
  pub deleted:    Option<String>,
}

/// Behaviour shared by every raw row type.
pub trait RawRow {
  /// The soft-deletion marker; any non-blank value means deleted.
  fn deletion_marker(&self) -> Option<&str>;

  /// Dotted identity for log lines, `?` standing in for missing parts.
  fn location(&self) -> String;

  fn is_deleted(&self) -> bool {
    self.deletion_marker().is_some_and(|m| !m.trim().is_empty())
  }
}

macro_rules! raw_row {
  ($($row:ty => [$($part:ident),+]),* $(,)?) => {
    $(impl RawRow for $row {
      fn deletion_marker(&self) -> Option<&str> { self.deleted.as_deref() }

      fn location(&self) -> String {
        [$(self.$part.as_deref()),+]
          .map(|part| part.unwrap_or("?"))
          .join(".")
      }
    })*
  };
}

raw_row! {
  RawTableRow      => [database, schema, table],
  RawColumnRow     => [database, schema, table, column],
  RawConstraintRow => [database, schema, table, constraint_name],
  RawStorageRow    => [database, schema, table],
  RawStageRow      => [database, schema, stage],
}

// ─── Defects ─────────────────────────────────────────────────────────────────

/// Why a raw row could not be mapped to an entity.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RowDefect {
  #[error("missing {0}")]
  MissingField(&'static str),

  #[error("{field} is not a valid timestamp: {value:?}")]
  InvalidTimestamp { field: &'static str, value: String },

  #[error("{field} is negative: {value}")]
  Negative { field: &'static str, value: i64 },

  #[error("unrecognised constraint type {0:?}")]
  UnknownConstraint(String),
}

fn required(
  value: Option<String>,
  field: &'static str,
) -> Result<String, RowDefect> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
    .ok_or(RowDefect::MissingField(field))
}

fn non_negative(
  value: Option<i64>,
  field: &'static str,
) -> Result<Option<u64>, RowDefect> {
  match value {
    None => Ok(None),
    Some(v) => u64::try_from(v)
      .map(Some)
      .map_err(|_| RowDefect::Negative { field, value: v }),
  }
}

fn small(
  value: Option<i64>,
  field: &'static str,
) -> Result<Option<u32>, RowDefect> {
  Ok(non_negative(value, field)?.map(|v| u32::try_from(v).unwrap_or(u32::MAX)))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
  value.filter(|v| !v.trim().is_empty())
}

/// Parse a catalog timestamp. Accepts RFC 3339, the space-separated form
/// SQLite and most warehouses emit (treated as UTC), or a bare date.
pub fn parse_timestamp(
  value: Option<String>,
  field: &'static str,
) -> Result<Option<DateTime<Utc>>, RowDefect> {
  let Some(raw) = blank_to_none(value) else {
    return Ok(None);
  };
  let trimmed = raw.trim();

  if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
    return Ok(Some(ts.with_timezone(&Utc)));
  }
  for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
      return Ok(Some(naive.and_utc()));
    }
  }
  if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
    && let Some(midnight) = date.and_hms_opt(0, 0, 0)
  {
    return Ok(Some(midnight.and_utc()));
  }

  Err(RowDefect::InvalidTimestamp {
    field,
    value: raw,
  })
}

/// Parse a clustering-key expression such as `LINEAR(REGION, "SOLD_AT")`
/// into its column names. Blank expressions mean "not clustered".
pub fn parse_clustering_key(raw: Option<&str>) -> Option<Vec<String>> {
  let expr = raw.map(str::trim).filter(|s| !s.is_empty())?;
  let inner = match expr.find('(') {
    Some(open) if expr.ends_with(')') => &expr[open + 1..expr.len() - 1],
    _ => expr,
  };
  let columns: Vec<String> = inner
    .split(',')
    .map(|c| c.trim().trim_matches('"').to_owned())
    .filter(|c| !c.is_empty())
    .collect();
  (!columns.is_empty()).then_some(columns)
}

// ─── Conversions ─────────────────────────────────────────────────────────────

fn table_key(
  database: Option<String>,
  schema: Option<String>,
  table: Option<String>,
) -> Result<TableKey, RowDefect> {
  Ok(TableKey {
    database: required(database, "database")?,
    schema:   required(schema, "schema")?,
    table:    required(table, "table")?,
  })
}

impl TryFrom<RawTableRow> for TableMetadata {
  type Error = RowDefect;

  fn try_from(row: RawTableRow) -> Result<Self, Self::Error> {
    let clustering_key = parse_clustering_key(row.clustering_key.as_deref());
    Ok(Self {
      key: table_key(row.database, row.schema, row.table)?,
      table_type: blank_to_none(row.table_type),
      row_count: non_negative(row.row_count, "row_count")?,
      byte_size: non_negative(row.bytes, "bytes")?,
      comment: blank_to_none(row.comment),
      created_at: parse_timestamp(row.created, "created")?,
      last_altered: parse_timestamp(row.last_altered, "last_altered")?,
      clustering_key,
    })
  }
}

impl TryFrom<RawColumnRow> for ColumnMetadata {
  type Error = RowDefect;

  fn try_from(row: RawColumnRow) -> Result<Self, Self::Error> {
    let table = table_key(row.database, row.schema, row.table)?;
    let column = required(row.column, "column")?;
    let data_type = required(row.data_type, "data_type")?.to_ascii_uppercase();
    // Missing nullability is treated as nullable; it is the weaker claim.
    let is_nullable = !row
      .is_nullable
      .as_deref()
      .is_some_and(|v| v.trim().eq_ignore_ascii_case("NO"));

    Ok(Self {
      table,
      column,
      ordinal_position: small(row.ordinal_position, "ordinal_position")?
        .unwrap_or(0),
      data_type,
      character_max_length: non_negative(
        row.character_max_length,
        "character_max_length",
      )?,
      numeric_precision: small(row.numeric_precision, "numeric_precision")?,
      numeric_scale: small(row.numeric_scale, "numeric_scale")?,
      is_nullable,
      comment: blank_to_none(row.comment),
    })
  }
}

impl RawConstraintRow {
  /// Constraint rows map to a `(table, kind)` pair; the lookup builder folds
  /// them into one [`crate::catalog::ConstraintInfo`] per table.
  pub fn into_constraint(
    self,
  ) -> Result<(TableKey, ConstraintKind), RowDefect> {
    let key = table_key(self.database, self.schema, self.table)?;
    let raw_kind = required(self.constraint_type, "constraint_type")?;
    let kind = ConstraintKind::parse(&raw_kind)
      .ok_or(RowDefect::UnknownConstraint(raw_kind))?;
    Ok((key, kind))
  }
}

impl TryFrom<RawStorageRow> for StorageMetrics {
  type Error = RowDefect;

  fn try_from(row: RawStorageRow) -> Result<Self, Self::Error> {
    Ok(Self {
      table:                    table_key(row.database, row.schema, row.table)?,
      active_bytes:             non_negative(row.active_bytes, "active_bytes")?
        .unwrap_or(0),
      time_travel_bytes:        non_negative(
        row.time_travel_bytes,
        "time_travel_bytes",
      )?
      .unwrap_or(0),
      failsafe_bytes:           non_negative(
        row.failsafe_bytes,
        "failsafe_bytes",
      )?
      .unwrap_or(0),
      retained_for_clone_bytes: non_negative(
        row.retained_for_clone_bytes,
        "retained_for_clone_bytes",
      )?
      .unwrap_or(0),
    })
  }
}

impl TryFrom<RawStageRow> for StageEntry {
  type Error = RowDefect;

  fn try_from(row: RawStageRow) -> Result<Self, Self::Error> {
    Ok(Self {
      database:   required(row.database, "database")?,
      schema:     required(row.schema, "schema")?,
      stage:      required(row.stage, "stage")?,
      url:        blank_to_none(row.url),
      stage_type: blank_to_none(row.stage_type),
      comment:    blank_to_none(row.comment),
    })
  }
}

// ─── Source trait ────────────────────────────────────────────────────────────

/// Supplies raw catalog rows. Implementations may push the database scope
/// down into their queries; the lookup builder re-applies it regardless.
pub trait CatalogSource {
  type Error: std::error::Error + Send + Sync + 'static;

  fn fetch_tables(
    &self,
    scope: &DatabaseScope,
  ) -> Result<Vec<RawTableRow>, Self::Error>;

  fn fetch_columns(
    &self,
    scope: &DatabaseScope,
  ) -> Result<Vec<RawColumnRow>, Self::Error>;

  fn fetch_constraints(
    &self,
    scope: &DatabaseScope,
  ) -> Result<Vec<RawConstraintRow>, Self::Error>;

  fn fetch_storage_metrics(
    &self,
    scope: &DatabaseScope,
  ) -> Result<Vec<RawStorageRow>, Self::Error>;

  fn fetch_stages(
    &self,
    scope: &DatabaseScope,
  ) -> Result<Vec<RawStageRow>, Self::Error>;
}

/// All five row sets of one catalog snapshot.
///
/// Also usable as a [`CatalogSource`] itself, which is how tests and
/// fixtures feed the pipeline.
#[derive(Debug, Clone, Default)]
pub struct RawCatalog {
  pub tables:      Vec<RawTableRow>,
  pub columns:     Vec<RawColumnRow>,
  pub constraints: Vec<RawConstraintRow>,
  pub storage:     Vec<RawStorageRow>,
  pub stages:      Vec<RawStageRow>,
}

impl RawCatalog {
  /// Fetch every row set from `source`, once.
  pub fn fetch<C: CatalogSource>(
    source: &C,
    scope: &DatabaseScope,
  ) -> Result<Self, C::Error> {
    Ok(Self {
      tables:      source.fetch_tables(scope)?,
      columns:     source.fetch_columns(scope)?,
      constraints: source.fetch_constraints(scope)?,
      storage:     source.fetch_storage_metrics(scope)?,
      stages:      source.fetch_stages(scope)?,
    })
  }

  pub fn row_count(&self) -> usize {
    self.tables.len()
      + self.columns.len()
      + self.constraints.len()
      + self.storage.len()
      + self.stages.len()
  }
}

impl CatalogSource for RawCatalog {
  type Error = Infallible;

  fn fetch_tables(
    &self,
    _scope: &DatabaseScope,
  ) -> Result<Vec<RawTableRow>, Self::Error> {
    Ok(self.tables.clone())
  }

  fn fetch_columns(
    &self,
    _scope: &DatabaseScope,
  ) -> Result<Vec<RawColumnRow>, Self::Error> {
    Ok(self.columns.clone())
  }

  fn fetch_constraints(
    &self,
    _scope: &DatabaseScope,
  ) -> Result<Vec<RawConstraintRow>, Self::Error> {
    Ok(self.constraints.clone())
  }

  fn fetch_storage_metrics(
    &self,
    _scope: &DatabaseScope,
  ) -> Result<Vec<RawStorageRow>, Self::Error> {
    Ok(self.storage.clone())
  }

  fn fetch_stages(
    &self,
    _scope: &DatabaseScope,
  ) -> Result<Vec<RawStageRow>, Self::Error> {
    Ok(self.stages.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_accept_common_catalog_forms() {
    let rfc = parse_timestamp(Some("2026-01-02T03:04:05Z".into()), "t")
      .unwrap()
      .unwrap();
    let spaced = parse_timestamp(Some("2026-01-02 03:04:05.000".into()), "t")
      .unwrap()
      .unwrap();
    assert_eq!(rfc, spaced);

    let date = parse_timestamp(Some("2026-01-02".into()), "t")
      .unwrap()
      .unwrap();
    assert_eq!(date.to_rfc3339(), "2026-01-02T00:00:00+00:00");

    assert_eq!(parse_timestamp(Some("  ".into()), "t"), Ok(None));
    assert!(matches!(
      parse_timestamp(Some("yesterday".into()), "last_altered"),
      Err(RowDefect::InvalidTimestamp { field: "last_altered", .. })
    ));
  }

  #[test]
  fn clustering_key_expressions() {
    assert_eq!(
      parse_clustering_key(Some("LINEAR(REGION, \"SOLD_AT\")")),
      Some(vec!["REGION".to_owned(), "SOLD_AT".to_owned()])
    );
    assert_eq!(
      parse_clustering_key(Some("REGION")),
      Some(vec!["REGION".to_owned()])
    );
    assert_eq!(parse_clustering_key(Some("LINEAR()")), None);
    assert_eq!(parse_clustering_key(None), None);
  }

  #[test]
  fn column_row_requires_identity_and_type() {
    let row = RawColumnRow {
      database: Some("DB".into()),
      schema: Some("S".into()),
      table: Some("T".into()),
      column: Some("C".into()),
      ..Default::default()
    };
    assert_eq!(
      ColumnMetadata::try_from(row),
      Err(RowDefect::MissingField("data_type"))
    );
  }

  #[test]
  fn column_row_maps_nullability_and_uppercases_type() {
    let row = RawColumnRow {
      database: Some("DB".into()),
      schema: Some("S".into()),
      table: Some("T".into()),
      column: Some("C".into()),
      data_type: Some("varchar".into()),
      character_max_length: Some(200),
      is_nullable: Some("NO".into()),
      ..Default::default()
    };
    let column = ColumnMetadata::try_from(row).unwrap();
    assert_eq!(column.data_type, "VARCHAR");
    assert!(!column.is_nullable);
    assert_eq!(column.character_max_length, Some(200));
  }

  #[test]
  fn negative_sizes_are_defects() {
    let row = RawTableRow {
      database: Some("DB".into()),
      schema: Some("S".into()),
      table: Some("T".into()),
      bytes: Some(-1),
      ..Default::default()
    };
    assert_eq!(
      TableMetadata::try_from(row),
      Err(RowDefect::Negative {
        field: "bytes",
        value: -1,
      })
    );
  }

  #[test]
  fn deletion_marker_and_location() {
    let mut row = RawStageRow {
      database: Some("DOCS".into()),
      stage: Some("INBOX".into()),
      ..Default::default()
    };
    assert!(!row.is_deleted());
    assert_eq!(row.location(), "DOCS.?.INBOX");
    row.deleted = Some("2026-01-01".into());
    assert!(row.is_deleted());
  }
}
