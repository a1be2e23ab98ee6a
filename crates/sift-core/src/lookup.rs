//! Metadata lookup builder.
//!
//! Raw rows become an [`Inventory`] (the persisted, sorted snapshot of every
//! in-scope entity), and an inventory becomes [`MetadataLookups`], the keyed
//! in-memory view every later stage reads from.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  catalog::{
    ColumnKey, ColumnMetadata, ConstraintInfo, StageEntry, StorageMetrics,
    TableKey, TableMetadata,
  },
  config::DatabaseScope,
  source::{RawCatalog, RawConstraintRow, RawRow, RowDefect},
};

// ─── Inventory ───────────────────────────────────────────────────────────────

/// Every in-scope catalog entity of one run, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
  pub tables:      Vec<TableMetadata>,
  pub columns:     Vec<ColumnMetadata>,
  pub constraints: Vec<ConstraintInfo>,
  pub storage:     Vec<StorageMetrics>,
  pub stages:      Vec<StageEntry>,
}

/// Row accounting for one inventory build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
  pub accepted:     usize,
  pub deleted:      usize,
  pub out_of_scope: usize,
  pub defective:    usize,
  pub duplicates:   usize,
}

/// Outcome of mapping one raw row.
enum Mapped<T> {
  Keep(T),
  Drop,
}

impl BuildStats {
  fn admit<R, T>(
    &mut self,
    kind: &'static str,
    row: R,
    convert: impl FnOnce(R) -> Result<T, RowDefect>,
    database: impl Fn(&T) -> &str,
    scope: &DatabaseScope,
  ) -> Mapped<T>
  where
    R: RawRow,
  {
    if row.is_deleted() {
      self.deleted += 1;
      return Mapped::Drop;
    }
    let location = row.location();
    match convert(row) {
      Err(defect) => {
        self.defective += 1;
        warn!(kind, %location, %defect, "skipping malformed catalog row");
        Mapped::Drop
      }
      Ok(entity) if !scope.includes(database(&entity)) => {
        self.out_of_scope += 1;
        Mapped::Drop
      }
      Ok(entity) => {
        self.accepted += 1;
        Mapped::Keep(entity)
      }
    }
  }

  fn duplicate(&mut self, kind: &'static str, key: &dyn std::fmt::Display) {
    self.duplicates += 1;
    debug!(kind, %key, "duplicate catalog row; keeping the last one");
  }
}

impl Inventory {
  /// Map raw rows into entities, dropping soft-deleted, out-of-scope and
  /// malformed rows. Never fails: defects are counted and logged.
  pub fn from_raw(
    raw: RawCatalog,
    scope: &DatabaseScope,
  ) -> (Self, BuildStats) {
    let mut stats = BuildStats::default();

    let mut tables = BTreeMap::new();
    for row in raw.tables {
      if let Mapped::Keep(table) = stats.admit(
        "table",
        row,
        TableMetadata::try_from,
        |t: &TableMetadata| t.key.database.as_str(),
        scope,
      ) && let Some(previous) = tables.insert(table.key.clone(), table)
      {
        stats.duplicate("table", &previous.key);
      }
    }

    let mut columns = BTreeMap::new();
    for row in raw.columns {
      if let Mapped::Keep(column) = stats.admit(
        "column",
        row,
        ColumnMetadata::try_from,
        |c: &ColumnMetadata| c.table.database.as_str(),
        scope,
      ) && let Some(previous) = columns.insert(column.key(), column)
      {
        stats.duplicate("column", &previous.key());
      }
    }

    let mut constraints: BTreeMap<TableKey, ConstraintInfo> = BTreeMap::new();
    for row in raw.constraints {
      if let Mapped::Keep((key, kind)) = stats.admit(
        "constraint",
        row,
        RawConstraintRow::into_constraint,
        |(key, _): &(TableKey, _)| key.database.as_str(),
        scope,
      ) {
        constraints
          .entry(key.clone())
          .or_insert_with(|| ConstraintInfo {
            table: key,
            kinds: BTreeSet::new(),
          })
          .kinds
          .insert(kind);
      }
    }

    let mut storage = BTreeMap::new();
    for row in raw.storage {
      if let Mapped::Keep(metrics) = stats.admit(
        "storage",
        row,
        StorageMetrics::try_from,
        |m: &StorageMetrics| m.table.database.as_str(),
        scope,
      ) && let Some(previous) = storage.insert(metrics.table.clone(), metrics)
      {
        stats.duplicate("storage", &previous.table);
      }
    }

    let mut stages = BTreeMap::new();
    for row in raw.stages {
      if let Mapped::Keep(stage) = stats.admit(
        "stage",
        row,
        StageEntry::try_from,
        |s: &StageEntry| s.database.as_str(),
        scope,
      ) && let Some(previous) = stages.insert(stage.key(), stage)
      {
        stats.duplicate("stage", &previous.key());
      }
    }

    let mut columns: Vec<ColumnMetadata> = columns.into_values().collect();
    columns.sort_by(|a, b| {
      (&a.table, a.ordinal_position, &a.column).cmp(&(
        &b.table,
        b.ordinal_position,
        &b.column,
      ))
    });

    let inventory = Self {
      tables: tables.into_values().collect(),
      columns,
      constraints: constraints.into_values().collect(),
      storage: storage.into_values().collect(),
      stages: stages.into_values().collect(),
    };
    (inventory, stats)
  }
}

// ─── Lookups ─────────────────────────────────────────────────────────────────

/// Keyed view over an [`Inventory`].
#[derive(Debug, Clone, Default)]
pub struct MetadataLookups {
  tables:       HashMap<TableKey, TableMetadata>,
  columns:      HashMap<TableKey, Vec<ColumnMetadata>>,
  column_index: HashMap<ColumnKey, (TableKey, usize)>,
  constraints:  HashMap<TableKey, ConstraintInfo>,
  storage:      HashMap<TableKey, StorageMetrics>,
  stages:       Vec<StageEntry>,
  table_keys:   Vec<TableKey>,
  databases:    BTreeSet<String>,
}

impl MetadataLookups {
  /// Index an inventory. `scope` is re-applied so that an inventory loaded
  /// from a previous, wider run is narrowed to this run's databases.
  pub fn new(inventory: &Inventory, scope: &DatabaseScope) -> Self {
    let mut lookups = Self::default();
    let mut keys = BTreeSet::new();

    for table in &inventory.tables {
      if !scope.includes(&table.key.database) {
        continue;
      }
      keys.insert(table.key.clone());
      lookups.tables.insert(table.key.clone(), table.clone());
    }

    // Inventory columns are already sorted by ordinal within each table.
    for column in &inventory.columns {
      if !scope.includes(&column.table.database) {
        continue;
      }
      keys.insert(column.table.clone());
      let list = lookups.columns.entry(column.table.clone()).or_default();
      lookups
        .column_index
        .insert(column.key(), (column.table.clone(), list.len()));
      list.push(column.clone());
    }

    for info in &inventory.constraints {
      if scope.includes(&info.table.database) {
        lookups.constraints.insert(info.table.clone(), info.clone());
      }
    }
    for metrics in &inventory.storage {
      if scope.includes(&metrics.table.database) {
        lookups.storage.insert(metrics.table.clone(), metrics.clone());
      }
    }
    lookups.stages = inventory
      .stages
      .iter()
      .filter(|s| scope.includes(&s.database))
      .cloned()
      .collect();

    lookups.databases = keys
      .iter()
      .map(|k| k.database.clone())
      .chain(lookups.stages.iter().map(|s| s.database.clone()))
      .collect();
    lookups.table_keys = keys.into_iter().collect();
    lookups
  }

  pub fn table(&self, key: &TableKey) -> Option<&TableMetadata> {
    self.tables.get(key)
  }

  /// Columns of a table in ordinal order; empty when unknown.
  pub fn columns(&self, key: &TableKey) -> &[ColumnMetadata] {
    self.columns.get(key).map(Vec::as_slice).unwrap_or_default()
  }

  pub fn column(&self, key: &ColumnKey) -> Option<&ColumnMetadata> {
    let (table, index) = self.column_index.get(key)?;
    self.columns.get(table)?.get(*index)
  }

  pub fn constraints(&self, key: &TableKey) -> Option<&ConstraintInfo> {
    self.constraints.get(key)
  }

  /// Whether any PRIMARY KEY, FOREIGN KEY or UNIQUE constraint is declared.
  pub fn has_constraints(&self, key: &TableKey) -> bool {
    self.constraints(key).is_some_and(|c| !c.kinds.is_empty())
  }

  pub fn storage(&self, key: &TableKey) -> Option<&StorageMetrics> {
    self.storage.get(key)
  }

  pub fn stages(&self) -> &[StageEntry] { &self.stages }

  /// Every table known through either table or column metadata, sorted.
  pub fn table_keys(&self) -> &[TableKey] { &self.table_keys }

  /// Databases with at least one in-scope table, column or stage.
  pub fn databases(&self) -> &BTreeSet<String> { &self.databases }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    catalog::ConstraintKind,
    source::{RawColumnRow, RawTableRow},
  };

  fn table_row(db: &str, table: &str) -> RawTableRow {
    RawTableRow {
      database: Some(db.into()),
      schema: Some("PUBLIC".into()),
      table: Some(table.into()),
      ..Default::default()
    }
  }

  fn column_row(db: &str, table: &str, column: &str, pos: i64) -> RawColumnRow {
    RawColumnRow {
      database: Some(db.into()),
      schema: Some("PUBLIC".into()),
      table: Some(table.into()),
      column: Some(column.into()),
      ordinal_position: Some(pos),
      data_type: Some("VARCHAR".into()),
      ..Default::default()
    }
  }

  #[test]
  fn soft_deleted_and_malformed_rows_are_skipped() {
    let mut deleted = table_row("DB", "GONE");
    deleted.deleted = Some("2026-01-01".into());
    let mut malformed = table_row("DB", "BROKEN");
    malformed.last_altered = Some("not a date".into());

    let raw = RawCatalog {
      tables: vec![table_row("DB", "KEPT"), deleted, malformed],
      ..Default::default()
    };
    let (inventory, stats) = Inventory::from_raw(raw, &DatabaseScope::all());

    assert_eq!(inventory.tables.len(), 1);
    assert_eq!(inventory.tables[0].key.table, "KEPT");
    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.defective, 1);
  }

  #[test]
  fn duplicate_rows_keep_the_last() {
    let mut first = table_row("DB", "T");
    first.comment = Some("first".into());
    let mut second = table_row("DB", "T");
    second.comment = Some("second".into());

    let raw = RawCatalog {
      tables: vec![first, second],
      ..Default::default()
    };
    let (inventory, stats) = Inventory::from_raw(raw, &DatabaseScope::all());

    assert_eq!(inventory.tables.len(), 1);
    assert_eq!(inventory.tables[0].comment.as_deref(), Some("second"));
    assert_eq!(stats.duplicates, 1);
  }

  #[test]
  fn scope_filters_rows_and_columns_keep_ordinal_order() {
    let scope = DatabaseScope::new(["sales"], Vec::<String>::new()).unwrap();
    let raw = RawCatalog {
      tables: vec![table_row("SALES", "ORDERS"), table_row("HR", "PEOPLE")],
      columns: vec![
        column_row("SALES", "ORDERS", "B", 2),
        column_row("SALES", "ORDERS", "A", 1),
        column_row("HR", "PEOPLE", "NAME", 1),
      ],
      constraints: vec![RawConstraintRow {
        database: Some("SALES".into()),
        schema: Some("PUBLIC".into()),
        table: Some("ORDERS".into()),
        constraint_name: Some("PK_ORDERS".into()),
        constraint_type: Some("PRIMARY KEY".into()),
        deleted: None,
      }],
      ..Default::default()
    };
    let (inventory, stats) = Inventory::from_raw(raw, &scope);
    assert_eq!(stats.out_of_scope, 2);

    let lookups = MetadataLookups::new(&inventory, &scope);
    let orders = TableKey::new("SALES", "PUBLIC", "ORDERS");
    let names: Vec<_> = lookups
      .columns(&orders)
      .iter()
      .map(|c| c.column.as_str())
      .collect();
    assert_eq!(names, ["A", "B"]);
    assert!(lookups.column(&orders.column("B")).is_some());
    assert!(lookups.has_constraints(&orders));
    assert_eq!(
      lookups.constraints(&orders).map(|c| c.kinds.clone()),
      Some(BTreeSet::from([ConstraintKind::PrimaryKey]))
    );
    assert_eq!(lookups.databases(), &BTreeSet::from(["SALES".to_owned()]));
  }

  #[test]
  fn tables_known_only_through_columns_are_listed() {
    let raw = RawCatalog {
      columns: vec![column_row("DB", "VIEWLIKE", "X", 1)],
      ..Default::default()
    };
    let (inventory, _) = Inventory::from_raw(raw, &DatabaseScope::all());
    let lookups = MetadataLookups::new(&inventory, &DatabaseScope::all());
    assert_eq!(
      lookups.table_keys(),
      &[TableKey::new("DB", "PUBLIC", "VIEWLIKE")]
    );
    assert!(lookups.table(&lookups.table_keys()[0]).is_none());
  }
}
