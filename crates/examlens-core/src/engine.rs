//! Analysis orchestrator.
//!
//! Wires the data flow: sheets are consolidated, then analyzed per subject
//! and overall, ranked, and packaged as a snapshot ready to store. Two stored
//! snapshots can later be compared.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consolidate::{Consolidator, DEFAULT_AMBIGUOUS_CLUSTER_SIZE, DEFAULT_SIMILARITY_THRESHOLD};
use crate::error::AnalysisError;
use crate::grading::{grade_distribution, pass_fail};
use crate::history::{subject_averages, ComparatorConfig, HistoricalComparator};
use crate::model::{Sheet, Snapshot};
use crate::ranking::{self, RankingEngine};
use crate::report::{ExamReport, ExamSnapshot, ProgressReport, SingleSubjectReport};
use crate::statistics::{self, performance_insights, StatsResult};
use crate::traits::NameMatcher;

/// Tunables for every analysis step. Deserializes from the `[analysis]`
/// section of the config file; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum marks per subject.
    pub max_marks: f64,
    /// Pass mark as a percentage of `max_marks`.
    pub pass_threshold: f64,
    /// Minimum name similarity for two spellings to be one student.
    pub similarity_threshold: f64,
    /// Cluster size flagged as an ambiguous identity (0 disables).
    pub ambiguous_cluster_size: usize,
    /// Sort names before clustering so results ignore upload order.
    pub sort_names_before_clustering: bool,
    /// Total change beyond which a student improved or declined.
    pub student_trend_threshold: f64,
    /// Mean total change beyond which the class improved or declined.
    pub class_trend_threshold: f64,
    /// Largest total change still counted as consistent.
    pub consistency_band: f64,
    /// Entries per leaderboard.
    pub leaderboard_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let comparator = ComparatorConfig::default();
        Self {
            max_marks: 100.0,
            pass_threshold: 50.0,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            ambiguous_cluster_size: DEFAULT_AMBIGUOUS_CLUSTER_SIZE,
            sort_names_before_clustering: false,
            student_trend_threshold: comparator.student_trend_threshold,
            class_trend_threshold: comparator.class_trend_threshold,
            consistency_band: comparator.consistency_band,
            leaderboard_size: 3,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.max_marks.is_finite() || self.max_marks <= 0.0 {
            return Err(AnalysisError::InvalidMaxMarks(self.max_marks));
        }
        if !(0.0..=100.0).contains(&self.pass_threshold) {
            return Err(AnalysisError::InvalidPassThreshold(self.pass_threshold));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(AnalysisError::InvalidThreshold(self.similarity_threshold));
        }
        for (name, value) in [
            ("student_trend_threshold", self.student_trend_threshold),
            ("class_trend_threshold", self.class_trend_threshold),
            ("consistency_band", self.consistency_band),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AnalysisError::InvalidTrendThreshold { name, value });
            }
        }
        Ok(())
    }

    pub fn comparator_config(&self) -> ComparatorConfig {
        ComparatorConfig {
            student_trend_threshold: self.student_trend_threshold,
            class_trend_threshold: self.class_trend_threshold,
            consistency_band: self.consistency_band,
        }
    }
}

/// Runs analyses with one validated configuration.
#[derive(Debug)]
pub struct AnalysisEngine {
    config: AnalysisConfig,
    ranking: RankingEngine,
    consolidator: Consolidator,
    comparator: HistoricalComparator,
}

impl AnalysisEngine {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let ranking = RankingEngine::new(config.max_marks)?;
        let consolidator = Consolidator::new(config.similarity_threshold)?
            .with_ambiguous_cluster_size(config.ambiguous_cluster_size)
            .sort_names(config.sort_names_before_clustering);
        let comparator = HistoricalComparator::new(config.comparator_config());
        Ok(Self {
            config,
            ranking,
            consolidator,
            comparator,
        })
    }

    /// Use a different name matcher for consolidation.
    pub fn with_matcher(mut self, matcher: impl NameMatcher + 'static) -> Self {
        self.consolidator = self.consolidator.with_matcher(matcher);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one subject's scores. `names[i]` labels `scores[i]`.
    pub fn analyze_marks(
        &self,
        scores: &[f64],
        names: Option<&[String]>,
    ) -> Result<SingleSubjectReport, AnalysisError> {
        let stats = statistics::analyze(scores)?;
        let ranking = self.ranking.rank(scores, names)?;
        let max_marks = self.config.max_marks;

        tracing::debug!(count = stats.count, mean = stats.mean, "analyzed marks");

        Ok(SingleSubjectReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            max_marks,
            pass_threshold: self.config.pass_threshold,
            class_summary: ranking.summary(),
            grade_distribution: grade_distribution(&stats.scores, max_marks),
            pass_fail: pass_fail(&stats.scores, self.config.pass_threshold, max_marks),
            insights: performance_insights(&stats, max_marks),
            stats,
            ranking,
        })
    }

    /// Consolidate `sheets` into one exam and analyze it.
    ///
    /// An empty exam is not an error: the report is simply empty.
    pub fn analyze_sheets(
        &self,
        exam_name: &str,
        exam_date: Option<NaiveDate>,
        sheets: &[Sheet],
    ) -> Result<ExamReport, AnalysisError> {
        let consolidation = self.consolidator.consolidate(sheets);
        let students = &consolidation.snapshot;

        let subject_stats = subject_stats(students)?;
        let totals: Vec<f64> = students.values().map(|r| r.total()).collect();
        let overall_stats = if totals.is_empty() {
            None
        } else {
            Some(statistics::analyze(&totals)?)
        };

        let ranking = self.ranking.rank_consolidated(students)?;
        let n = self.config.leaderboard_size;

        tracing::debug!(
            exam = exam_name,
            students = students.len(),
            subjects = subject_stats.len(),
            "analyzed exam"
        );

        Ok(ExamReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            max_marks: self.config.max_marks,
            class_summary: ranking.summary(),
            subject_summaries: ranking::subject_summaries(students),
            subject_leaders: ranking::subject_leaders(students, n),
            top_students: ranking::top_students(students, n),
            subject_stats,
            overall_stats,
            ranking,
            clusters: consolidation.clusters,
            warnings: consolidation.warnings,
            skipped: consolidation.skipped,
            rows_read: consolidation.rows_read,
            rows_accepted: consolidation.rows_accepted,
            snapshot: ExamSnapshot::new(exam_name, exam_date, consolidation.snapshot),
        })
    }

    /// Compare a current exam against a previous one.
    pub fn compare(&self, current: &ExamSnapshot, previous: &ExamSnapshot) -> ProgressReport {
        let progress = self
            .comparator
            .compare_progress(&current.students, &previous.students);
        let insights = self.comparator.extract_insights(&progress);
        if insights.is_none() {
            tracing::warn!(
                current = %current.exam_name,
                previous = %previous.exam_name,
                "exams share no students; no comparison possible"
            );
        }

        ProgressReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            current_exam: current.exam_name.clone(),
            previous_exam: previous.exam_name.clone(),
            subject_averages: subject_averages(&current.students, &previous.students),
            progress,
            insights,
        }
    }
}

fn subject_stats(students: &Snapshot) -> Result<BTreeMap<String, StatsResult>, AnalysisError> {
    let mut columns: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in students.values() {
        for (subject, score) in record.subjects() {
            columns.entry(subject).or_default().push(score);
        }
    }
    columns
        .into_iter()
        .map(|(subject, scores)| Ok((subject.to_string(), statistics::analyze(&scores)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::LetterGrade;
    use crate::history::Trend;
    use crate::model::TOTAL_KEY;
    use crate::statistics::{ClassLevel, PerformanceInsight};

    fn make_sheets() -> Vec<Sheet> {
        vec![
            Sheet::from_pairs("Math", [("Alice Smith", 90.0), ("Bob Stone", 60.0), ("Cara", 75.0)]),
            Sheet::from_pairs("Science", [("Alise Smith", 80.0), ("Bob Stone", 70.0), ("Cara", 75.0)]),
        ]
    }

    #[test]
    fn default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.similarity_threshold, 0.8);
        assert_eq!(config.comparator_config(), ComparatorConfig::default());
    }

    #[test]
    fn invalid_config_rejected() {
        let config = AnalysisConfig {
            pass_threshold: 120.0,
            ..AnalysisConfig::default()
        };
        assert_eq!(
            AnalysisEngine::new(config).unwrap_err(),
            AnalysisError::InvalidPassThreshold(120.0)
        );
    }

    #[test]
    fn trend_thresholds_must_be_non_negative() {
        let config = AnalysisConfig {
            student_trend_threshold: -1.0,
            ..AnalysisConfig::default()
        };
        assert_eq!(
            AnalysisEngine::new(config).unwrap_err(),
            AnalysisError::InvalidTrendThreshold {
                name: "student_trend_threshold",
                value: -1.0
            }
        );

        let config: AnalysisConfig = toml::from_str("consistency_band = nan\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidTrendThreshold { name: "consistency_band", .. }
        ));
        assert!(err.to_string().contains("consistency_band must be a non-negative number"));

        let config = AnalysisConfig {
            class_trend_threshold: 0.0,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_from_partial_toml() {
        let config: AnalysisConfig = toml::from_str("max_marks = 50.0\nleaderboard_size = 5\n").unwrap();
        assert_eq!(config.max_marks, 50.0);
        assert_eq!(config.leaderboard_size, 5);
        assert_eq!(config.pass_threshold, 50.0);
    }

    #[test]
    fn marks_report() {
        let engine = AnalysisEngine::new(AnalysisConfig::default()).unwrap();
        let report = engine.analyze_marks(&[50.0, 60.0, 70.0, 80.0, 90.0], None).unwrap();

        assert!((report.stats.mean - 70.0).abs() < 1e-9);
        assert_eq!(report.stats.median, 70.0);
        assert_eq!(report.stats.mode, None);
        assert_eq!(report.ranking.len(), 5);
        assert_eq!(report.pass_fail.passed_count, 5);
        assert_eq!(report.grade_distribution.counts[&LetterGrade::C], 1);
        assert_eq!(report.class_summary.as_ref().unwrap().top_performer, "Student 5");
        assert!(matches!(
            report.insights[0],
            PerformanceInsight::ClassLevel { level: ClassLevel::Good, .. }
        ));
    }

    #[test]
    fn empty_marks_fail() {
        let engine = AnalysisEngine::new(AnalysisConfig::default()).unwrap();
        assert!(engine.analyze_marks(&[], None).unwrap_err().is_empty_input());
    }

    #[test]
    fn exam_report_from_sheets() {
        let engine = AnalysisEngine::new(AnalysisConfig::default()).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 10);
        let report = engine.analyze_sheets("Finals", date, &make_sheets()).unwrap();

        assert_eq!(report.exam_name(), "Finals");
        assert_eq!(report.snapshot.exam_date, date.unwrap());
        assert_eq!(report.snapshot.student_count(), 3);
        assert_eq!(report.snapshot.students["Alice Smith"].get(TOTAL_KEY), Some(170.0));
        assert_eq!(report.subject_stats.len(), 2);
        assert_eq!(report.overall_stats.as_ref().unwrap().count, 3);
        assert_eq!(report.ranking.entries[0].name, "Alice Smith");
        assert_eq!(report.top_students.len(), 3);
        assert_eq!(report.subject_leaders["Math"][0].name, "Alice Smith");
        assert_eq!(report.rows_accepted, 6);
    }

    #[test]
    fn empty_exam_is_an_empty_report() {
        let engine = AnalysisEngine::new(AnalysisConfig::default()).unwrap();
        let report = engine.analyze_sheets("Nothing", None, &[]).unwrap();
        assert!(report.ranking.is_empty());
        assert!(report.overall_stats.is_none());
        assert!(report.class_summary.is_none());
    }

    #[test]
    fn compare_two_exams() {
        let engine = AnalysisEngine::new(AnalysisConfig::default()).unwrap();
        let previous = engine.analyze_sheets("Midterm", None, &make_sheets()).unwrap().snapshot;
        let current = engine
            .analyze_sheets(
                "Finals",
                None,
                &[
                    Sheet::from_pairs("Math", [("Alice Smith", 95.0), ("Bob Stone", 50.0)]),
                    Sheet::from_pairs("Science", [("Alice Smith", 85.0), ("Bob Stone", 60.0)]),
                ],
            )
            .unwrap()
            .snapshot;

        let report = engine.compare(&current, &previous);
        assert_eq!(report.progress.len(), 2);
        assert_eq!(report.progress.previous_only, vec!["Cara"]);
        assert_eq!(report.progress.get("Alice Smith").unwrap().overall_trend, Trend::Improved);
        assert_eq!(report.progress.get("Bob Stone").unwrap().overall_trend, Trend::Declined);
        let insights = report.insights.unwrap();
        assert_eq!(insights.most_improved.name, "Alice Smith");
        assert!(report.subject_averages.contains_key("Math"));
    }

    #[test]
    fn compare_without_overlap_has_no_insights() {
        let engine = AnalysisEngine::new(AnalysisConfig::default()).unwrap();
        let a = ExamSnapshot::new("A", None, Snapshot::new());
        let b = ExamSnapshot::new("B", None, Snapshot::new());
        let report = engine.compare(&a, &b);
        assert!(report.is_empty());
        assert!(report.insights.is_none());
    }
}
