//! Row decoding and scope push-down.
//!
//! Every column is read as an optional value; a NULL or missing field is the
//! core's problem, not ours. A value of the wrong storage class fails the
//! decode and the fetch skips that row.

use rusqlite::Row;
use sift_core::{
  config::DatabaseScope,
  source::{
    RawColumnRow, RawConstraintRow, RawStageRow, RawStorageRow, RawTableRow,
  },
};

// ─── Queries ─────────────────────────────────────────────────────────────────

pub const SELECT_TABLES: &str = "
SELECT table_catalog, table_schema, table_name, table_type, row_count, bytes,
       comment, created, last_altered, clustering_key, deleted
  FROM tables";

pub const SELECT_COLUMNS: &str = "
SELECT table_catalog, table_schema, table_name, column_name, ordinal_position,
       data_type, character_maximum_length, numeric_precision, numeric_scale,
       is_nullable, comment, deleted
  FROM columns";

pub const SELECT_CONSTRAINTS: &str = "
SELECT table_catalog, table_schema, table_name, constraint_name,
       constraint_type, deleted
  FROM table_constraints";

pub const SELECT_STORAGE: &str = "
SELECT table_catalog, table_schema, table_name, active_bytes,
       time_travel_bytes, failsafe_bytes, retained_for_clone_bytes, deleted
  FROM table_storage_metrics";

pub const SELECT_STAGES: &str = "
SELECT stage_catalog, stage_schema, stage_name, stage_url, stage_type,
       comment, deleted
  FROM stages";

// ─── Scope ───────────────────────────────────────────────────────────────────

/// A `WHERE` clause restricting `column` to the scope, and its parameters.
///
/// An unrestricted scope yields an empty clause.
pub fn scope_filter(
  column: &str,
  scope: &DatabaseScope,
) -> (String, Vec<String>) {
  let (names, operator) = if !scope.targets().is_empty() {
    (scope.targets(), "IN")
  } else if !scope.excludes().is_empty() {
    (scope.excludes(), "NOT IN")
  } else {
    return (String::new(), Vec::new());
  };
  let placeholders = vec!["?"; names.len()].join(", ");
  let clause =
    format!(" WHERE upper({column}) {operator} ({placeholders})");
  (clause, names.iter().cloned().collect())
}

// ─── Rows ────────────────────────────────────────────────────────────────────

pub fn decode_table(row: &Row<'_>) -> rusqlite::Result<RawTableRow> {
  Ok(RawTableRow {
    database:       row.get("table_catalog")?,
    schema:         row.get("table_schema")?,
    table:          row.get("table_name")?,
    table_type:     row.get("table_type")?,
    row_count:      row.get("row_count")?,
    bytes:          row.get("bytes")?,
    comment:        row.get("comment")?,
    created:        row.get("created")?,
    last_altered:   row.get("last_altered")?,
    clustering_key: row.get("clustering_key")?,
    deleted:        row.get("deleted")?,
  })
}

pub fn decode_column(row: &Row<'_>) -> rusqlite::Result<RawColumnRow> {
  Ok(RawColumnRow {
    database:             row.get("table_catalog")?,
    schema:               row.get("table_schema")?,
    table:                row.get("table_name")?,
    column:               row.get("column_name")?,
    ordinal_position:     row.get("ordinal_position")?,
    data_type:            row.get("data_type")?,
    character_max_length: row.get("character_maximum_length")?,
    numeric_precision:    row.get("numeric_precision")?,
    numeric_scale:        row.get("numeric_scale")?,
    is_nullable:          row.get("is_nullable")?,
    comment:              row.get("comment")?,
    deleted:              row.get("deleted")?,
  })
}

pub fn decode_constraint(row: &Row<'_>) -> rusqlite::Result<RawConstraintRow> {
  Ok(RawConstraintRow {
    database:        row.get("table_catalog")?,
    schema:          row.get("table_schema")?,
    table:           row.get("table_name")?,
    constraint_name: row.get("constraint_name")?,
    constraint_type: row.get("constraint_type")?,
    deleted:         row.get("deleted")?,
  })
}

pub fn decode_storage(row: &Row<'_>) -> rusqlite::Result<RawStorageRow> {
  Ok(RawStorageRow {
    database:                 row.get("table_catalog")?,
    schema:                   row.get("table_schema")?,
    table:                    row.get("table_name")?,
    active_bytes:             row.get("active_bytes")?,
    time_travel_bytes:        row.get("time_travel_bytes")?,
    failsafe_bytes:           row.get("failsafe_bytes")?,
    retained_for_clone_bytes: row.get("retained_for_clone_bytes")?,
    deleted:                  row.get("deleted")?,
  })
}

pub fn decode_stage(row: &Row<'_>) -> rusqlite::Result<RawStageRow> {
  Ok(RawStageRow {
    database:   row.get("stage_catalog")?,
    schema:     row.get("stage_schema")?,
    stage:      row.get("stage_name")?,
    url:        row.get("stage_url")?,
    stage_type: row.get("stage_type")?,
    comment:    row.get("comment")?,
    deleted:    row.get("deleted")?,
  })
}
