//! examlens-store: snapshot persistence and configuration.
//!
//! Implements the `SnapshotStore` trait over an in-memory map and a
//! directory of JSON files, and loads `examlens.toml`.

pub mod config;
pub mod error;
pub mod json;
pub mod memory;

pub use config::{create_store, load_config, load_config_from, ExamlensConfig, StoreConfig};
pub use error::StoreError;
pub use json::JsonDirStore;
pub use memory::MemoryStore;

use examlens_core::report::ExamSnapshot;
use examlens_core::traits::SnapshotStore;

/// File-safe key for an exam name: lowercase alphanumerics joined by `-`.
///
/// Names that differ only in case or punctuation share a key.
pub fn exam_key(exam_name: &str) -> Result<String, StoreError> {
    let mut key = String::with_capacity(exam_name.len());
    for ch in exam_name.trim().chars() {
        if ch.is_alphanumeric() {
            key.extend(ch.to_lowercase());
        } else if !key.is_empty() && !key.ends_with('-') {
            key.push('-');
        }
    }
    while key.ends_with('-') {
        key.pop();
    }
    if key.is_empty() {
        return Err(StoreError::InvalidExamName(exam_name.to_string()));
    }
    Ok(key)
}

/// Fetch a snapshot that must exist.
pub fn require(store: &dyn SnapshotStore, exam_name: &str) -> anyhow::Result<ExamSnapshot> {
    store
        .get(exam_name)?
        .ok_or_else(|| StoreError::NotFound(exam_name.to_string()).into())
}
