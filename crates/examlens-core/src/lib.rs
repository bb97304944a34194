//! examlens-core: statistics, identity consolidation, ranking, and progress
//! comparison for exam marks.
//!
//! Everything here is computation over in-memory values, apart from the
//! file readers in [`parser`] and the JSON helpers in [`report`]. Persistence
//! is reached only through the [`traits::SnapshotStore`] seam.

pub mod consolidate;
pub mod engine;
pub mod error;
pub mod grading;
pub mod history;
pub mod matcher;
pub mod model;
pub mod parser;
pub mod ranking;
pub mod report;
pub mod statistics;
pub mod traits;

pub use error::AnalysisError;
