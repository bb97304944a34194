//! Store error types.

use thiserror::Error;

/// Errors specific to snapshot storage. IO and parse failures travel as
/// `anyhow` errors with the offending path attached.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No snapshot is stored under the exam name.
    #[error("no stored exam named {0:?}")]
    NotFound(String),

    /// The exam name has no character usable as a storage key.
    #[error("invalid exam name {0:?}: needs at least one letter or digit")]
    InvalidExamName(String),
}
