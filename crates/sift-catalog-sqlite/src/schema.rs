//! SQL schema of a catalog snapshot.
//!
//! Column names follow the warehouse's account-usage views. Timestamps are
//! stored as text; `deleted` is NULL for live objects.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tables (
    table_catalog   TEXT,
    table_schema    TEXT,
    table_name      TEXT,
    table_type      TEXT,
    row_count       INTEGER,
    bytes           INTEGER,
    comment         TEXT,
    created         TEXT,
    last_altered    TEXT,
    clustering_key  TEXT,      -- e.g. 'LINEAR(ORDER_DATE, REGION)'
    deleted         TEXT
);

CREATE TABLE IF NOT EXISTS columns (
    table_catalog            TEXT,
    table_schema             TEXT,
    table_name               TEXT,
    column_name              TEXT,
    ordinal_position         INTEGER,
    data_type                TEXT,
    character_maximum_length INTEGER,
    numeric_precision        INTEGER,
    numeric_scale            INTEGER,
    is_nullable              TEXT,   -- 'YES' | 'NO'
    comment                  TEXT,
    deleted                  TEXT
);

-- One row per declared constraint.
CREATE TABLE IF NOT EXISTS table_constraints (
    table_catalog    TEXT,
    table_schema     TEXT,
    table_name       TEXT,
    constraint_name  TEXT,
    constraint_type  TEXT,   -- 'PRIMARY KEY' | 'FOREIGN KEY' | 'UNIQUE'
    deleted          TEXT
);

CREATE TABLE IF NOT EXISTS table_storage_metrics (
    table_catalog            TEXT,
    table_schema             TEXT,
    table_name               TEXT,
    active_bytes             INTEGER,
    time_travel_bytes        INTEGER,
    failsafe_bytes           INTEGER,
    retained_for_clone_bytes INTEGER,
    deleted                  TEXT
);

CREATE TABLE IF NOT EXISTS stages (
    stage_catalog  TEXT,
    stage_schema   TEXT,
    stage_name     TEXT,
    stage_url      TEXT,
    stage_type     TEXT,
    comment        TEXT,
    deleted        TEXT
);
";
