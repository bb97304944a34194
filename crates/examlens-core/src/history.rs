//! Progress between two exam sittings.
//!
//! Students are joined on exact canonical name; no fuzzy matching happens at
//! this stage. Students present in only one snapshot are left out of the
//! per-student comparison and listed in [`ProgressComparison::current_only`]
//! and [`ProgressComparison::previous_only`].
//!
//! Two thresholds are in play and deliberately kept apart: a student's trend
//! uses `student_trend_threshold` (5 marks) while the class-wide trend uses
//! `class_trend_threshold` (2 marks).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Snapshot, TOTAL_KEY};
use crate::statistics;

/// Direction of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improved,
    Declined,
    Stable,
}

impl Trend {
    /// `Improved` above `threshold`, `Declined` below `-threshold`.
    pub fn classify(change: f64, threshold: f64) -> Self {
        if change > threshold {
            Trend::Improved
        } else if change < -threshold {
            Trend::Declined
        } else {
            Trend::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improved => "improved",
            Trend::Declined => "declined",
            Trend::Stable => "stable",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of the class as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassTrend {
    Improving,
    Declining,
    Stable,
}

impl std::fmt::Display for ClassTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ClassTrend::Improving => "improving",
            ClassTrend::Declining => "declining",
            ClassTrend::Stable => "stable",
        })
    }
}

/// One subject's score in both sittings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubjectChange {
    pub current: f64,
    pub previous: f64,
    pub change: f64,
    /// `change / previous * 100`, or 0 when `previous` is not positive.
    pub percentage_change: f64,
}

impl SubjectChange {
    pub fn new(current: f64, previous: f64) -> Self {
        let change = current - previous;
        Self {
            current,
            previous,
            change,
            percentage_change: percentage_change(change, previous),
        }
    }
}

/// A joined student's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Subjects present in both sittings, `"Total"` included when both have it.
    pub subjects: BTreeMap<String, SubjectChange>,
    pub current_total: f64,
    pub previous_total: f64,
    pub total_change: f64,
    pub total_percentage_change: f64,
    pub overall_trend: Trend,
    pub improved_subjects: Vec<String>,
    pub declined_subjects: Vec<String>,
}

/// Result of joining two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressComparison {
    pub students: BTreeMap<String, ProgressRecord>,
    /// Students only in the current snapshot.
    pub current_only: Vec<String>,
    /// Students only in the previous snapshot.
    pub previous_only: Vec<String>,
}

impl ProgressComparison {
    /// True when the snapshots share no student, i.e. no comparison is possible.
    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn get(&self, student: &str) -> Option<&ProgressRecord> {
        self.students.get(student)
    }
}

/// A subject's class average in both sittings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubjectAverage {
    pub current_avg: f64,
    pub previous_avg: f64,
    pub change: f64,
    pub percentage_change: f64,
    /// Sign of `change` only.
    pub trend: Trend,
}

/// A student singled out by an insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentChange {
    pub name: String,
    pub total_change: f64,
}

/// How many joined students moved in each direction for one subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectTally {
    pub improved: usize,
    pub declined: usize,
    pub unchanged: usize,
}

/// Class-level observations over a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInsights {
    pub most_improved: StudentChange,
    pub most_declined: StudentChange,
    /// Students whose total moved by at most the consistency band.
    pub consistent_performers: Vec<String>,
    pub overall_class_trend: ClassTrend,
    /// Mean total change across joined students.
    pub average_change: f64,
    pub subject_improvements: BTreeMap<String, SubjectTally>,
}

/// Thresholds used by [`HistoricalComparator`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorConfig {
    /// Total change beyond which a student counts as improved/declined.
    pub student_trend_threshold: f64,
    /// Mean total change beyond which the class counts as improving/declining.
    pub class_trend_threshold: f64,
    /// Largest absolute total change still counted as consistent.
    pub consistency_band: f64,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            student_trend_threshold: 5.0,
            class_trend_threshold: 2.0,
            consistency_band: 5.0,
        }
    }
}

/// Compares two consolidated snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistoricalComparator {
    config: ComparatorConfig,
}

impl HistoricalComparator {
    pub fn new(config: ComparatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComparatorConfig {
        &self.config
    }

    /// Per-student progress for students present in both snapshots.
    pub fn compare_progress(&self, current: &Snapshot, previous: &Snapshot) -> ProgressComparison {
        let mut comparison = ProgressComparison::default();

        for (student, now) in current {
            let Some(before) = previous.get(student) else {
                comparison.current_only.push(student.clone());
                continue;
            };

            let mut subjects = BTreeMap::new();
            let mut improved_subjects = Vec::new();
            let mut declined_subjects = Vec::new();

            for (subject, score) in now.iter() {
                let Some(prev) = before.get(subject) else {
                    continue;
                };
                let change = SubjectChange::new(score, prev);
                if subject != TOTAL_KEY {
                    if change.change > 0.0 {
                        improved_subjects.push(subject.to_string());
                    } else if change.change < 0.0 {
                        declined_subjects.push(subject.to_string());
                    }
                }
                subjects.insert(subject.to_string(), change);
            }

            let total = SubjectChange::new(now.total(), before.total());
            comparison.students.insert(
                student.clone(),
                ProgressRecord {
                    subjects,
                    current_total: total.current,
                    previous_total: total.previous,
                    total_change: total.change,
                    total_percentage_change: total.percentage_change,
                    overall_trend: Trend::classify(total.change, self.config.student_trend_threshold),
                    improved_subjects,
                    declined_subjects,
                },
            );
        }

        comparison.previous_only = previous
            .keys()
            .filter(|name| !current.contains_key(*name))
            .cloned()
            .collect();

        if comparison.is_empty() {
            tracing::debug!("snapshots share no students; nothing to compare");
        } else if !comparison.current_only.is_empty() || !comparison.previous_only.is_empty() {
            tracing::debug!(
                joined = comparison.students.len(),
                current_only = comparison.current_only.len(),
                previous_only = comparison.previous_only.len(),
                "partial overlap between snapshots"
            );
        }

        comparison
    }

    /// Class-level observations; `None` when no students were joined.
    ///
    /// Most improved/declined pick the largest/smallest total change, the
    /// first student in name order winning ties.
    pub fn extract_insights(&self, comparison: &ProgressComparison) -> Option<ProgressInsights> {
        let mut students = comparison.students.iter();
        let (first_name, first) = students.next()?;

        let mut most_improved = (first_name, first.total_change);
        let mut most_declined = (first_name, first.total_change);
        for (name, record) in students {
            if record.total_change > most_improved.1 {
                most_improved = (name, record.total_change);
            }
            if record.total_change < most_declined.1 {
                most_declined = (name, record.total_change);
            }
        }

        let consistent_performers = comparison
            .students
            .iter()
            .filter(|(_, r)| r.total_change.abs() <= self.config.consistency_band)
            .map(|(name, _)| name.clone())
            .collect();

        let changes: Vec<f64> = comparison.students.values().map(|r| r.total_change).collect();
        let average_change = statistics::mean(&changes);
        let overall_class_trend = match Trend::classify(average_change, self.config.class_trend_threshold) {
            Trend::Improved => ClassTrend::Improving,
            Trend::Declined => ClassTrend::Declining,
            Trend::Stable => ClassTrend::Stable,
        };

        let mut subject_improvements: BTreeMap<String, SubjectTally> = BTreeMap::new();
        for record in comparison.students.values() {
            for (subject, change) in &record.subjects {
                if subject == TOTAL_KEY {
                    continue;
                }
                let tally = subject_improvements.entry(subject.clone()).or_default();
                if change.change > 0.0 {
                    tally.improved += 1;
                } else if change.change < 0.0 {
                    tally.declined += 1;
                } else {
                    tally.unchanged += 1;
                }
            }
        }

        Some(ProgressInsights {
            most_improved: StudentChange {
                name: most_improved.0.clone(),
                total_change: most_improved.1,
            },
            most_declined: StudentChange {
                name: most_declined.0.clone(),
                total_change: most_declined.1,
            },
            consistent_performers,
            overall_class_trend,
            average_change,
            subject_improvements,
        })
    }
}

/// Compare with the default thresholds.
pub fn compare_progress(current: &Snapshot, previous: &Snapshot) -> ProgressComparison {
    HistoricalComparator::default().compare_progress(current, previous)
}

/// Insights with the default thresholds.
pub fn extract_insights(comparison: &ProgressComparison) -> Option<ProgressInsights> {
    HistoricalComparator::default().extract_insights(comparison)
}

/// Subject averages in each snapshot, compared for subjects in both.
///
/// Each average covers every student in its own snapshot, not only the
/// students the two snapshots share.
pub fn subject_averages(current: &Snapshot, previous: &Snapshot) -> BTreeMap<String, SubjectAverage> {
    let now = averages(current);
    let before = averages(previous);

    now.into_iter()
        .filter_map(|(subject, current_avg)| {
            let previous_avg = *before.get(&subject)?;
            let change = current_avg - previous_avg;
            Some((
                subject,
                SubjectAverage {
                    current_avg,
                    previous_avg,
                    change,
                    percentage_change: percentage_change(change, previous_avg),
                    trend: Trend::classify(change, 0.0),
                },
            ))
        })
        .collect()
}

fn averages(snapshot: &Snapshot) -> BTreeMap<String, f64> {
    let mut columns: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for record in snapshot.values() {
        for (subject, score) in record.iter() {
            if score.is_finite() {
                columns.entry(subject).or_default().push(score);
            }
        }
    }
    columns
        .into_iter()
        .map(|(subject, scores)| (subject.to_string(), statistics::mean(&scores)))
        .collect()
}

fn percentage_change(change: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        change / previous * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StudentRecord;

    fn rec(pairs: &[(&str, f64)]) -> StudentRecord {
        pairs.iter().map(|&(k, v)| (k, v)).collect()
    }

    fn snapshot(students: &[(&str, &[(&str, f64)])]) -> Snapshot {
        students
            .iter()
            .map(|&(name, pairs)| (name.to_string(), rec(pairs)))
            .collect()
    }

    #[test]
    fn total_only_records_compare() {
        let current = snapshot(&[("Bob", &[("Total", 80.0)])]);
        let previous = snapshot(&[("Bob", &[("Total", 60.0)])]);
        let progress = compare_progress(&current, &previous);

        let bob = progress.get("Bob").unwrap();
        assert_eq!(bob.total_change, 20.0);
        assert_eq!(bob.overall_trend, Trend::Improved);
        assert!((bob.total_percentage_change - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn trend_thresholds_are_exclusive() {
        assert_eq!(Trend::classify(5.0, 5.0), Trend::Stable);
        assert_eq!(Trend::classify(5.01, 5.0), Trend::Improved);
        assert_eq!(Trend::classify(-5.0, 5.0), Trend::Stable);
        assert_eq!(Trend::classify(-6.0, 5.0), Trend::Declined);
    }

    #[test]
    fn per_subject_changes() {
        let current = snapshot(&[(
            "Alice",
            &[("Math", 90.0), ("Science", 60.0), ("Art", 50.0), ("Total", 200.0)],
        )]);
        let previous = snapshot(&[(
            "Alice",
            &[("Math", 80.0), ("Science", 70.0), ("History", 40.0), ("Total", 190.0)],
        )]);
        let progress = compare_progress(&current, &previous);
        let alice = progress.get("Alice").unwrap();

        assert_eq!(alice.subjects.len(), 3);
        assert_eq!(alice.subjects["Math"].change, 10.0);
        assert!((alice.subjects["Math"].percentage_change - 12.5).abs() < 1e-9);
        assert_eq!(alice.subjects["Science"].change, -10.0);
        assert_eq!(alice.improved_subjects, vec!["Math"]);
        assert_eq!(alice.declined_subjects, vec!["Science"]);
        assert_eq!(alice.total_change, 10.0);
        assert_eq!(alice.overall_trend, Trend::Improved);
    }

    #[test]
    fn zero_previous_gives_zero_percentage() {
        let change = SubjectChange::new(30.0, 0.0);
        assert_eq!(change.change, 30.0);
        assert_eq!(change.percentage_change, 0.0);
    }

    #[test]
    fn unmatched_students_are_reported_not_compared() {
        let current = snapshot(&[("Alice", &[("Total", 50.0)]), ("Cara", &[("Total", 70.0)])]);
        let previous = snapshot(&[("alice", &[("Total", 40.0)]), ("Cara", &[("Total", 70.0)])]);
        let progress = compare_progress(&current, &previous);

        assert_eq!(progress.len(), 1);
        assert_eq!(progress.get("Cara").unwrap().overall_trend, Trend::Stable);
        assert_eq!(progress.current_only, vec!["Alice"]);
        assert_eq!(progress.previous_only, vec!["alice"]);
    }

    #[test]
    fn disjoint_snapshots_give_empty_comparison() {
        let current = snapshot(&[("Alice", &[("Total", 50.0)])]);
        let previous = snapshot(&[("Bob", &[("Total", 40.0)])]);
        let progress = compare_progress(&current, &previous);

        assert!(progress.is_empty());
        assert!(extract_insights(&progress).is_none());
    }

    #[test]
    fn subject_averages_use_whole_snapshots() {
        let current = snapshot(&[
            ("Alice", &[("Math", 80.0)]),
            ("Bob", &[("Math", 60.0), ("Art", 90.0)]),
        ]);
        let previous = snapshot(&[
            ("Alice", &[("Math", 70.0)]),
            ("Dan", &[("Math", 50.0), ("Music", 10.0)]),
        ]);
        let averages = subject_averages(&current, &previous);

        assert_eq!(averages.len(), 1);
        let math = averages["Math"];
        assert_eq!(math.current_avg, 70.0);
        assert_eq!(math.previous_avg, 60.0);
        assert_eq!(math.change, 10.0);
        assert_eq!(math.trend, Trend::Improved);
    }

    #[test]
    fn subject_average_trend_uses_sign_only() {
        let current = snapshot(&[("A", &[("Math", 60.5)])]);
        let previous = snapshot(&[("A", &[("Math", 60.0)])]);
        assert_eq!(subject_averages(&current, &previous)["Math"].trend, Trend::Improved);

        let same = subject_averages(&previous, &previous);
        assert_eq!(same["Math"].trend, Trend::Stable);
    }

    #[test]
    fn insights_pick_extremes_and_class_trend() {
        let current = snapshot(&[
            ("Ann", &[("Math", 70.0), ("Total", 70.0)]),
            ("Ben", &[("Math", 40.0), ("Total", 40.0)]),
            ("Cy", &[("Math", 63.0), ("Total", 63.0)]),
            ("Di", &[("Math", 90.0), ("Total", 90.0)]),
        ]);
        let previous = snapshot(&[
            ("Ann", &[("Math", 50.0), ("Total", 50.0)]),
            ("Ben", &[("Math", 50.0), ("Total", 50.0)]),
            ("Cy", &[("Math", 60.0), ("Total", 60.0)]),
            ("Di", &[("Math", 70.0), ("Total", 70.0)]),
        ]);
        let progress = compare_progress(&current, &previous);
        let insights = extract_insights(&progress).unwrap();

        // Ann and Di both +20: first in name order wins
        assert_eq!(insights.most_improved.name, "Ann");
        assert_eq!(insights.most_improved.total_change, 20.0);
        assert_eq!(insights.most_declined.name, "Ben");
        assert_eq!(insights.consistent_performers, vec!["Cy"]);
        // mean change (20 - 10 + 3 + 20) / 4 = 8.25
        assert!((insights.average_change - 8.25).abs() < 1e-9);
        assert_eq!(insights.overall_class_trend, ClassTrend::Improving);
        assert_eq!(
            insights.subject_improvements["Math"],
            SubjectTally { improved: 3, declined: 1, unchanged: 0 }
        );
        assert!(!insights.subject_improvements.contains_key(TOTAL_KEY));
    }

    #[test]
    fn class_trend_uses_its_own_threshold() {
        // +3 each: stable per student, improving for the class
        let current = snapshot(&[("A", &[("Total", 53.0)]), ("B", &[("Total", 63.0)])]);
        let previous = snapshot(&[("A", &[("Total", 50.0)]), ("B", &[("Total", 60.0)])]);
        let progress = compare_progress(&current, &previous);
        assert!(progress.students.values().all(|r| r.overall_trend == Trend::Stable));

        let insights = extract_insights(&progress).unwrap();
        assert_eq!(insights.overall_class_trend, ClassTrend::Improving);

        let strict = HistoricalComparator::new(ComparatorConfig {
            class_trend_threshold: 5.0,
            ..ComparatorConfig::default()
        });
        assert_eq!(
            strict.extract_insights(&progress).unwrap().overall_class_trend,
            ClassTrend::Stable
        );
    }

    #[test]
    fn trends_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Trend::Improved).unwrap(), "\"improved\"");
        assert_eq!(serde_json::to_string(&ClassTrend::Declining).unwrap(), "\"declining\"");
    }
}
