//! Trait seams for identity matching and snapshot persistence.
//!
//! The engines depend only on these traits; the `examlens-store` crate
//! provides the persistence implementations.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::report::ExamSnapshot;

// ---------------------------------------------------------------------------
// Name matching
// ---------------------------------------------------------------------------

/// Scores how likely two raw name strings refer to the same student.
pub trait NameMatcher: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Similarity in `[0, 1]`; `1.0` means the same identity.
    fn similarity(&self, a: &str, b: &str) -> f64;
}

// ---------------------------------------------------------------------------
// Snapshot persistence
// ---------------------------------------------------------------------------

/// Keyed storage for consolidated exam snapshots.
///
/// Implementations must make each exam name's snapshot visible atomically:
/// a `get` never observes a partially written `put`.
pub trait SnapshotStore: Send + Sync {
    /// Human-readable store name (e.g. "json").
    fn name(&self) -> &str;

    /// Insert or replace the snapshot stored under `snapshot.exam_name`.
    fn put(&self, snapshot: &ExamSnapshot) -> anyhow::Result<()>;

    /// Fetch a snapshot by exam name.
    fn get(&self, exam_name: &str) -> anyhow::Result<Option<ExamSnapshot>>;

    /// Every stored exam, oldest exam date first, then by name.
    fn list(&self) -> anyhow::Result<Vec<ExamSummary>>;

    /// Delete a snapshot; returns whether one existed.
    fn remove(&self, exam_name: &str) -> anyhow::Result<bool>;
}

/// Listing entry for a stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSummary {
    pub id: Uuid,
    pub exam_name: String,
    pub exam_date: NaiveDate,
    pub stored_at: DateTime<Utc>,
    pub student_count: usize,
}

impl From<&ExamSnapshot> for ExamSummary {
    fn from(snapshot: &ExamSnapshot) -> Self {
        Self {
            id: snapshot.id,
            exam_name: snapshot.exam_name.clone(),
            exam_date: snapshot.exam_date,
            stored_at: snapshot.stored_at,
            student_count: snapshot.students.len(),
        }
    }
}

/// Sort summaries the way [`SnapshotStore::list`] promises.
pub fn sort_summaries(summaries: &mut [ExamSummary]) {
    summaries.sort_by(|a, b| {
        a.exam_date
            .cmp(&b.exam_date)
            .then_with(|| a.exam_name.cmp(&b.exam_name))
    });
}
