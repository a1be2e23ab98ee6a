//! [`SqliteCatalog`]: the SQLite implementation of [`CatalogSource`].

use std::path::Path;

use rusqlite::{Connection, OpenFlags, Row, params_from_iter, types::ValueRef};
use sift_core::{
  config::DatabaseScope,
  source::{
    CatalogSource, RawColumnRow, RawConstraintRow, RawStageRow, RawStorageRow,
    RawTableRow,
  },
};
use tracing::{debug, warn};

use crate::{
  Error, Result,
  encode::{
    SELECT_COLUMNS, SELECT_CONSTRAINTS, SELECT_STAGES, SELECT_STORAGE,
    SELECT_TABLES, decode_column, decode_constraint, decode_stage,
    decode_storage, decode_table, scope_filter,
  },
  schema::SCHEMA,
};

/// A catalog snapshot in a single SQLite file.
pub struct SqliteCatalog {
  conn: Connection,
}

impl SqliteCatalog {
  /// Open an existing snapshot read-only.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if !path.exists() {
      return Err(Error::MissingSnapshot(path.to_path_buf()));
    }
    let conn = Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(Self { conn })
  }

  /// Open (or create) a writable snapshot at `path` and ensure the schema.
  pub fn create(path: impl AsRef<Path>) -> Result<Self> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(Self { conn })
  }

  /// An empty in-memory snapshot, for tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SCHEMA)?;
    Ok(Self { conn })
  }

  /// The underlying connection, for loading snapshot rows.
  pub fn connection(&self) -> &Connection { &self.conn }

  fn fetch<T>(
    &self,
    select: &str,
    database_column: &str,
    scope: &DatabaseScope,
    decode: fn(&Row<'_>) -> rusqlite::Result<T>,
  ) -> Result<Vec<T>> {
    let (filter, params) = scope_filter(database_column, scope);
    let sql = format!("{select}{filter} ORDER BY rowid");
    let mut stmt = self.conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;

    let mut decoded = Vec::new();
    let mut skipped = 0usize;
    while let Some(row) = rows.next()? {
      match decode(row) {
        Ok(value) => decoded.push(value),
        Err(e) if is_value_defect(&e) => {
          skipped += 1;
          warn!(
            row = %location(row),
            error = %e,
            "skipping malformed snapshot row"
          );
        }
        Err(e) => return Err(e.into()),
      }
    }
    debug!(rows = decoded.len(), skipped, %scope, "fetched snapshot rows");
    Ok(decoded)
  }
}

/// A stored value that does not fit its field. Confined to one row.
fn is_value_defect(error: &rusqlite::Error) -> bool {
  matches!(
    error,
    rusqlite::Error::InvalidColumnType(..)
      | rusqlite::Error::FromSqlConversionFailure(..)
      | rusqlite::Error::IntegralValueOutOfRange(..)
  )
}

/// Dotted identity from the first three selected columns, which every query
/// puts first.
fn location(row: &Row<'_>) -> String {
  (0..3usize)
    .map(|idx| match row.get_ref(idx) {
      Ok(ValueRef::Text(text)) => String::from_utf8_lossy(text).into_owned(),
      _ => "?".to_owned(),
    })
    .collect::<Vec<_>>()
    .join(".")
}

impl CatalogSource for SqliteCatalog {
  type Error = Error;

  fn fetch_tables(&self, scope: &DatabaseScope) -> Result<Vec<RawTableRow>> {
    self.fetch(SELECT_TABLES, "table_catalog", scope, decode_table)
  }

  fn fetch_columns(&self, scope: &DatabaseScope) -> Result<Vec<RawColumnRow>> {
    self.fetch(SELECT_COLUMNS, "table_catalog", scope, decode_column)
  }

  fn fetch_constraints(
    &self,
    scope: &DatabaseScope,
  ) -> Result<Vec<RawConstraintRow>> {
    self.fetch(SELECT_CONSTRAINTS, "table_catalog", scope, decode_constraint)
  }

  fn fetch_storage_metrics(
    &self,
    scope: &DatabaseScope,
  ) -> Result<Vec<RawStorageRow>> {
    self.fetch(SELECT_STORAGE, "table_catalog", scope, decode_storage)
  }

  fn fetch_stages(&self, scope: &DatabaseScope) -> Result<Vec<RawStageRow>> {
    self.fetch(SELECT_STAGES, "stage_catalog", scope, decode_stage)
  }
}
