//! Filesystem backend for sift artifacts.
//!
//! Each artifact is one JSON document in the output directory, under a file
//! name fixed by its kind. Writes go through a temporary file in the same
//! directory and are renamed into place, so a reader sees either the old
//! document or the new one.

mod layout;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use layout::file_name;
pub use store::FsStore;

#[cfg(test)]
mod tests;
