//! SQLite catalog snapshots as a sift [`CatalogSource`].
//!
//! A snapshot holds one table per warehouse catalog view (tables, columns,
//! table constraints, table storage metrics and stages), with the view's
//! column names and its `deleted` marker. Rows are returned as raw rows;
//! soft-deletion and type mapping are left to `sift-core`.
//!
//! [`CatalogSource`]: sift_core::source::CatalogSource

mod encode;
mod schema;
mod source;

pub mod error;

pub use error::{Error, Result};
pub use schema::SCHEMA;
pub use source::SqliteCatalog;
