//! Core types, traits and the staged analysis pipeline for sift.
//!
//! sift ranks warehouse tables and columns by how ready they are for AI
//! workloads, working from catalog metadata alone. This crate owns the
//! domain model and every scoring rule; it is free of database and
//! filesystem dependencies. Backends plug in through two traits:
//! [`source::CatalogSource`] supplies raw catalog rows and
//! [`store::ArtifactStore`] persists the JSON artifacts that make a run
//! resumable.

pub mod artifact;
pub mod cache;
pub mod candidate;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod confirm;
pub mod detect;
pub mod error;
pub mod history;
pub mod lookup;
pub mod merge;
pub mod pipeline;
pub mod profile;
pub mod report;
pub mod score;
pub mod source;
pub mod stage;
pub mod store;


pub use error::{ConfigError, Error, Result};

/// Round to two decimal places, the precision every persisted score uses.
pub(crate) fn round2(value: f64) -> f64 { (value * 100.0).round() / 100.0 }
