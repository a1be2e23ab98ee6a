//! Catalog entities: the typed view of warehouse metadata.
//!
//! Everything here is metadata about tables and columns; no row data ever
//! enters the system. Entities are built from raw source rows at the boundary
//! (see [`crate::source`]) and are immutable for the rest of a run.

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Composite identity of a table: `(database, schema, table)`.
///
/// Ordering is lexical over the three parts, which is the processing order
/// used everywhere a run needs to be reproducible.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TableKey {
  pub database: String,
  pub schema:   String,
  pub table:    String,
}

impl TableKey {
  pub fn new(
    database: impl Into<String>,
    schema: impl Into<String>,
    table: impl Into<String>,
  ) -> Self {
    Self {
      database: database.into(),
      schema:   schema.into(),
      table:    table.into(),
    }
  }

  /// Key for a column of this table.
  pub fn column(&self, column: impl Into<String>) -> ColumnKey {
    ColumnKey {
      table:  self.clone(),
      column: column.into(),
    }
  }
}

impl fmt::Display for TableKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.database, self.schema, self.table)
  }
}

/// Composite identity of a column: `(database, schema, table, column)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnKey {
  pub table:  TableKey,
  pub column: String,
}

impl fmt::Display for ColumnKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.table, self.column)
  }
}

// ─── Data types ──────────────────────────────────────────────────────────────

/// Coarse classification of a declared column type, as far as AI workloads
/// are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
  /// Variable-length character data.
  Text,
  /// VARIANT / OBJECT / ARRAY.
  SemiStructured,
  Numeric,
  Temporal,
  /// Binary and geospatial types; unusable for vectorisation or prompting.
  Incompatible,
  Other,
}

const TEXT_TYPES: &[&str] = &[
  "VARCHAR", "TEXT", "STRING", "CHAR", "CHARACTER", "NVARCHAR", "NCHAR",
  "NVARCHAR2", "CHAR VARYING", "CHARACTER VARYING",
];

const SEMI_STRUCTURED_TYPES: &[&str] = &["VARIANT", "OBJECT", "ARRAY"];

const NUMERIC_TYPES: &[&str] = &[
  "NUMBER", "DECIMAL", "NUMERIC", "INT", "INTEGER", "BIGINT", "SMALLINT",
  "TINYINT", "BYTEINT", "FLOAT", "FLOAT4", "FLOAT8", "DOUBLE",
  "DOUBLE PRECISION", "REAL", "FIXED",
];

const TEMPORAL_TYPES: &[&str] = &[
  "DATE", "DATETIME", "TIME", "TIMESTAMP", "TIMESTAMP_LTZ", "TIMESTAMP_NTZ",
  "TIMESTAMP_TZ",
];

const INCOMPATIBLE_TYPES: &[&str] =
  &["BINARY", "VARBINARY", "GEOGRAPHY", "GEOMETRY"];

/// Strip any length/precision suffix: `"TIMESTAMP_LTZ(9)"` → `"TIMESTAMP_LTZ"`.
pub fn base_type(data_type: &str) -> &str {
  data_type.split('(').next().unwrap_or(data_type).trim()
}

impl TypeClass {
  /// Classify a declared data type. Matching is case-insensitive and ignores
  /// any `(length)` / `(precision, scale)` suffix.
  pub fn of(data_type: &str) -> Self {
    let base = base_type(data_type).to_ascii_uppercase();
    let base = base.as_str();
    if TEXT_TYPES.contains(&base) {
      Self::Text
    } else if SEMI_STRUCTURED_TYPES.contains(&base) {
      Self::SemiStructured
    } else if NUMERIC_TYPES.contains(&base) {
      Self::Numeric
    } else if TEMPORAL_TYPES.contains(&base) {
      Self::Temporal
    } else if INCOMPATIBLE_TYPES.contains(&base) {
      Self::Incompatible
    } else {
      Self::Other
    }
  }
}

// ─── Tables ──────────────────────────────────────────────────────────────────

/// Table-level catalog metadata. Refreshed wholesale from the source each run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
  #[serde(flatten)]
  pub key:            TableKey,
  pub table_type:     Option<String>,
  pub row_count:      Option<u64>,
  pub byte_size:      Option<u64>,
  pub comment:        Option<String>,
  pub created_at:     Option<DateTime<Utc>>,
  pub last_altered:   Option<DateTime<Utc>>,
  /// Columns of the declared clustering key, if any.
  pub clustering_key: Option<Vec<String>>,
}

impl TableMetadata {
  pub fn has_comment(&self) -> bool { has_text(self.comment.as_deref()) }

  pub fn is_clustered(&self) -> bool {
    self
      .clustering_key
      .as_ref()
      .is_some_and(|cols| !cols.is_empty())
  }
}

// ─── Columns ─────────────────────────────────────────────────────────────────

/// Column-level catalog metadata, addressed through its parent table key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
  #[serde(flatten)]
  pub table:                TableKey,
  pub column:               String,
  pub ordinal_position:     u32,
  /// Declared type, upper-cased.
  pub data_type:            String,
  pub character_max_length: Option<u64>,
  pub numeric_precision:    Option<u32>,
  pub numeric_scale:        Option<u32>,
  pub is_nullable:          bool,
  pub comment:              Option<String>,
}

impl ColumnMetadata {
  pub fn key(&self) -> ColumnKey { self.table.column(self.column.clone()) }

  pub fn type_class(&self) -> TypeClass { TypeClass::of(&self.data_type) }

  pub fn has_comment(&self) -> bool { has_text(self.comment.as_deref()) }
}

// ─── Constraints ─────────────────────────────────────────────────────────────

/// The constraint kinds that count as data-quality signals.
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
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintKind {
  PrimaryKey,
  ForeignKey,
  Unique,
}

impl ConstraintKind {
  /// Parse the catalog spelling: `PRIMARY KEY`, `PRIMARY_KEY`, `unique`, ….
  pub fn parse(raw: &str) -> Option<Self> {
    let normalised = raw.trim().to_ascii_uppercase().replace(' ', "_");
    match normalised.as_str() {
      "PRIMARY_KEY" => Some(Self::PrimaryKey),
      "FOREIGN_KEY" => Some(Self::ForeignKey),
      "UNIQUE" => Some(Self::Unique),
      _ => None,
    }
  }
}

/// The set of constraint kinds declared on a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintInfo {
  #[serde(flatten)]
  pub table: TableKey,
  pub kinds: BTreeSet<ConstraintKind>,
}

// ─── Storage ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMetrics {
  #[serde(flatten)]
  pub table:                    TableKey,
  pub active_bytes:             u64,
  pub time_travel_bytes:        u64,
  pub failsafe_bytes:           u64,
  pub retained_for_clone_bytes: u64,
}

// ─── Stages ──────────────────────────────────────────────────────────────────

/// A named storage area (internal or external stage) holding files. The
/// source supplies these directly; they are the only input to document
/// processing detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
  pub database:   String,
  pub schema:     String,
  pub stage:      String,
  pub url:        Option<String>,
  pub stage_type: Option<String>,
  pub comment:    Option<String>,
}

impl StageEntry {
  /// Stages are addressed like tables for keying purposes.
  pub fn key(&self) -> TableKey {
    TableKey::new(&self.database, &self.schema, &self.stage)
  }

  pub fn is_external(&self) -> bool {
    has_text(self.url.as_deref())
      || self
        .stage_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("external"))
  }
}

/// `true` when the value is present and not blank.
pub(crate) fn has_text(value: Option<&str>) -> bool {
  value.is_some_and(|s| !s.trim().is_empty())
}
