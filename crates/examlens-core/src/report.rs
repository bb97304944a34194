//! Persisted result types: stored exam snapshots and analysis reports.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consolidate::{ConsolidationWarning, NameCluster};
use crate::grading::{GradeDistribution, PassFailStats};
use crate::history::{ProgressComparison, ProgressInsights, SubjectAverage};
use crate::model::{SkippedItem, Snapshot};
use crate::ranking::{ClassSummary, Leader, Ranking, SubjectSummary};
use crate::statistics::{PerformanceInsight, StatsResult};
use crate::traits::ExamSummary;

/// One exam's consolidated data, as kept for later comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSnapshot {
    pub id: Uuid,
    pub exam_name: String,
    pub exam_date: NaiveDate,
    /// When the snapshot was built.
    pub stored_at: DateTime<Utc>,
    pub students: Snapshot,
}

impl ExamSnapshot {
    /// Wrap `students` under an exam name; the date defaults to today (UTC).
    pub fn new(exam_name: impl Into<String>, exam_date: Option<NaiveDate>, students: Snapshot) -> Self {
        let stored_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            exam_name: exam_name.into(),
            exam_date: exam_date.unwrap_or_else(|| stored_at.date_naive()),
            stored_at,
            students,
        }
    }

    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    pub fn summary(&self) -> ExamSummary {
        ExamSummary::from(self)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_json(self, path, "snapshot")
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        load_json(path, "snapshot")
    }
}

/// Everything computed for one subject's score list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleSubjectReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub max_marks: f64,
    /// Pass threshold in percent of `max_marks`.
    pub pass_threshold: f64,
    pub stats: StatsResult,
    pub ranking: Ranking,
    pub class_summary: Option<ClassSummary>,
    pub grade_distribution: GradeDistribution,
    pub pass_fail: PassFailStats,
    pub insights: Vec<PerformanceInsight>,
}

impl SingleSubjectReport {
    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_json(self, path, "report")
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        load_json(path, "report")
    }
}

/// Everything computed for a multi-subject exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub max_marks: f64,
    /// The consolidated exam, ready to store.
    pub snapshot: ExamSnapshot,
    pub clusters: Vec<NameCluster>,
    pub warnings: Vec<ConsolidationWarning>,
    pub skipped: Vec<SkippedItem>,
    pub rows_read: usize,
    pub rows_accepted: usize,
    /// Statistics per subject.
    pub subject_stats: BTreeMap<String, StatsResult>,
    /// Statistics over student totals; absent for an empty exam.
    pub overall_stats: Option<StatsResult>,
    pub ranking: Ranking,
    pub class_summary: Option<ClassSummary>,
    pub subject_summaries: BTreeMap<String, SubjectSummary>,
    pub subject_leaders: BTreeMap<String, Vec<Leader>>,
    pub top_students: Vec<Leader>,
}

impl ExamReport {
    pub fn exam_name(&self) -> &str {
        &self.snapshot.exam_name
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_json(self, path, "report")
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        load_json(path, "report")
    }
}

/// Comparison of two stored exams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub current_exam: String,
    pub previous_exam: String,
    pub progress: ProgressComparison,
    pub subject_averages: BTreeMap<String, SubjectAverage>,
    /// Absent when the exams share no students.
    pub insights: Option<ProgressInsights>,
}

impl ProgressReport {
    /// True when no student appears in both exams.
    pub fn is_empty(&self) -> bool {
        self.progress.is_empty()
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_json(self, path, "report")
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        load_json(path, "report")
    }
}

fn save_json<T: Serialize>(value: &T, path: &Path, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value).with_context(|| format!("failed to serialize {what}"))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {what} to {}", path.display()))?;
    Ok(())
}

fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {what} JSON"))
}
