//! Tie-aware ranking of single-subject score lists and consolidated exams.
//!
//! Ranks follow competition ranking: equal scores share a rank and the next
//! distinct score resumes at its 1-based position, so `[90, 90, 80]` ranks as
//! `[1, 1, 3]`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::grading::{percentage_of, LetterGrade};
use crate::model::{SkipReason, SkippedItem, Snapshot, StudentRecord};
use crate::statistics;

/// One ranked student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub rank: usize,
    pub name: String,
    /// Subject score, or the total across subjects in multi-subject mode.
    pub score: f64,
    pub percentage: f64,
    pub grade: LetterGrade,
    /// Per-subject detail; only present for consolidated rankings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<SubjectBreakdown>,
}

/// A student's subject scores with their strongest and weakest subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectBreakdown {
    /// Subject scores, `"Total"` excluded.
    pub scores: BTreeMap<String, f64>,
    pub best_subject: String,
    pub best_score: f64,
    pub worst_subject: String,
    pub worst_score: f64,
    pub subject_count: usize,
    pub average_per_subject: f64,
}

impl SubjectBreakdown {
    /// `None` when the record has no subject scores.
    pub fn from_record(record: &StudentRecord) -> Option<Self> {
        let mut subjects = record.subjects();
        let (first_subject, first_score) = subjects.next()?;

        let (mut best, mut worst) = ((first_subject, first_score), (first_subject, first_score));
        let mut scores = BTreeMap::new();
        scores.insert(first_subject.to_string(), first_score);

        // strict comparisons keep the first subject in key order on ties
        for (subject, score) in subjects {
            if score > best.1 {
                best = (subject, score);
            }
            if score < worst.1 {
                worst = (subject, score);
            }
            scores.insert(subject.to_string(), score);
        }

        let subject_count = scores.len();
        let sum: f64 = scores.values().sum();
        Some(Self {
            best_subject: best.0.to_string(),
            best_score: best.1,
            worst_subject: worst.0.to_string(),
            worst_score: worst.1,
            subject_count,
            average_per_subject: sum / subject_count as f64,
            scores,
        })
    }
}

/// Ordered ranking plus the inputs left out of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub entries: Vec<RankingEntry>,
    pub skipped: Vec<SkippedItem>,
}

impl Ranking {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rank numbers in ranking order.
    pub fn ranks(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.rank).collect()
    }

    pub fn entry(&self, name: &str) -> Option<&RankingEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Class summary derived from this ranking; `None` when it is empty.
    pub fn summary(&self) -> Option<ClassSummary> {
        ClassSummary::from_ranking(self)
    }
}

/// Aggregate view of a ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub total_students: usize,
    pub class_average: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub top_performer: String,
    /// Count per grade, only grades that occur.
    pub grade_distribution: BTreeMap<LetterGrade, usize>,
}

impl ClassSummary {
    pub fn from_ranking(ranking: &Ranking) -> Option<Self> {
        let top = ranking.entries.first()?;
        let scores: Vec<f64> = ranking.entries.iter().map(|e| e.score).collect();

        let mut grade_distribution = BTreeMap::new();
        for entry in &ranking.entries {
            *grade_distribution.entry(entry.grade).or_insert(0) += 1;
        }

        Some(Self {
            total_students: ranking.entries.len(),
            class_average: statistics::mean(&scores),
            highest_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            lowest_score: scores.iter().copied().fold(f64::INFINITY, f64::min),
            top_performer: top.name.clone(),
            grade_distribution,
        })
    }
}

/// Per-subject aggregates over a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSummary {
    pub count: usize,
    pub total: f64,
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub std_dev: f64,
}

/// A `(student, score)` pair on a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leader {
    pub name: String,
    pub score: f64,
}

/// Produces rankings against a fixed maximum mark per subject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingEngine {
    max_marks: f64,
}

impl Default for RankingEngine {
    fn default() -> Self {
        Self { max_marks: 100.0 }
    }
}

struct Candidate {
    name: String,
    score: f64,
    percentage: f64,
    breakdown: Option<SubjectBreakdown>,
}

impl RankingEngine {
    pub fn new(max_marks: f64) -> Result<Self, AnalysisError> {
        if !max_marks.is_finite() || max_marks <= 0.0 {
            return Err(AnalysisError::InvalidMaxMarks(max_marks));
        }
        Ok(Self { max_marks })
    }

    pub fn max_marks(&self) -> f64 {
        self.max_marks
    }

    /// Rank a single subject's scores.
    ///
    /// `names[i]` labels `scores[i]`; missing names default to
    /// `"Student {i + 1}"`. Non-finite scores are skipped. An empty input
    /// ranks to an empty list; a non-empty input with no finite score fails
    /// with [`AnalysisError::EmptyInput`].
    pub fn rank(&self, scores: &[f64], names: Option<&[String]>) -> Result<Ranking, AnalysisError> {
        let mut skipped = Vec::new();
        let mut candidates = Vec::with_capacity(scores.len());

        for (i, &score) in scores.iter().enumerate() {
            let name = names
                .and_then(|n| n.get(i))
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Student {}", i + 1));

            if !score.is_finite() {
                skipped.push(SkippedItem::new(name, SkipReason::NonFiniteScore));
                continue;
            }
            candidates.push(Candidate {
                name,
                score,
                percentage: percentage_of(score, self.max_marks),
                breakdown: None,
            });
        }

        if candidates.is_empty() && !scores.is_empty() {
            return Err(AnalysisError::EmptyInput {
                discarded: skipped.len(),
            });
        }

        Ok(Ranking {
            entries: assign_ranks(candidates),
            skipped,
        })
    }

    /// Rank consolidated students by their total across subjects.
    ///
    /// Totals are recomputed from the subject scores; a stored `"Total"` is
    /// not trusted. The percentage is the total over `max_marks` times the
    /// student's own subject count.
    pub fn rank_consolidated(&self, snapshot: &Snapshot) -> Result<Ranking, AnalysisError> {
        let mut skipped = Vec::new();
        let mut candidates = Vec::with_capacity(snapshot.len());

        for (name, record) in snapshot {
            let Some(breakdown) = SubjectBreakdown::from_record(record) else {
                tracing::warn!(student = %name, "no subject scores, leaving out of ranking");
                skipped.push(SkippedItem::new(name.clone(), SkipReason::NoSubjectScores));
                continue;
            };
            let total: f64 = breakdown.scores.values().sum();
            if !total.is_finite() {
                skipped.push(SkippedItem::new(name.clone(), SkipReason::NonFiniteScore));
                continue;
            }
            let max_total = self.max_marks * breakdown.subject_count as f64;
            candidates.push(Candidate {
                name: name.clone(),
                score: total,
                percentage: percentage_of(total, max_total),
                breakdown: Some(breakdown),
            });
        }

        if candidates.is_empty() && !snapshot.is_empty() {
            return Err(AnalysisError::EmptyInput {
                discarded: skipped.len(),
            });
        }

        Ok(Ranking {
            entries: assign_ranks(candidates),
            skipped,
        })
    }

    /// One ranking per subject; students without the subject are omitted.
    pub fn rank_by_subject(&self, snapshot: &Snapshot) -> Result<BTreeMap<String, Ranking>, AnalysisError> {
        let mut rankings = BTreeMap::new();
        for (subject, pairs) in subject_columns(snapshot) {
            let (names, scores): (Vec<String>, Vec<f64>) = pairs.into_iter().unzip();
            let ranking = self.rank(&scores, Some(names.as_slice()))?;
            rankings.insert(subject, ranking);
        }
        Ok(rankings)
    }
}

/// Sort descending (stable) and assign competition ranks.
fn assign_ranks(mut candidates: Vec<Candidate>) -> Vec<RankingEntry> {
    candidates.sort_by(|a, b| desc(a.score, b.score));

    let mut entries: Vec<RankingEntry> = Vec::with_capacity(candidates.len());
    for (position, c) in candidates.into_iter().enumerate() {
        let rank = match entries.last() {
            Some(prev) if prev.score == c.score => prev.rank,
            _ => position + 1,
        };
        entries.push(RankingEntry {
            rank,
            grade: LetterGrade::from_percentage(c.percentage),
            name: c.name,
            score: c.score,
            percentage: c.percentage,
            breakdown: c.breakdown,
        });
    }
    entries
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Finite subject scores grouped by subject, students in key order.
fn subject_columns(snapshot: &Snapshot) -> BTreeMap<String, Vec<(String, f64)>> {
    let mut columns: BTreeMap<String, Vec<(String, f64)>> = BTreeMap::new();
    for (name, record) in snapshot {
        for (subject, score) in record.subjects() {
            if score.is_finite() {
                columns
                    .entry(subject.to_string())
                    .or_default()
                    .push((name.clone(), score));
            }
        }
    }
    columns
}

/// Total, average, extremes, and spread of every subject.
pub fn subject_summaries(snapshot: &Snapshot) -> BTreeMap<String, SubjectSummary> {
    subject_columns(snapshot)
        .into_iter()
        .map(|(subject, pairs)| {
            let scores: Vec<f64> = pairs.iter().map(|(_, s)| *s).collect();
            let average = statistics::mean(&scores);
            let summary = SubjectSummary {
                count: scores.len(),
                total: scores.iter().sum(),
                average,
                highest: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                lowest: scores.iter().copied().fold(f64::INFINITY, f64::min),
                std_dev: statistics::sample_variance(&scores, average).sqrt(),
            };
            (subject, summary)
        })
        .collect()
}

/// Top `n` students in every subject, `"Total"` excluded.
pub fn subject_leaders(snapshot: &Snapshot, n: usize) -> BTreeMap<String, Vec<Leader>> {
    subject_columns(snapshot)
        .into_iter()
        .map(|(subject, pairs)| (subject, top_n(pairs, n)))
        .collect()
}

/// Top `n` students by total, recomputed from subject scores. Students
/// without subject scores are left out.
pub fn top_students(snapshot: &Snapshot, n: usize) -> Vec<Leader> {
    let pairs = snapshot
        .iter()
        .filter(|(_, record)| record.subject_count() > 0)
        .map(|(name, record)| (name.clone(), record.subject_sum()))
        .filter(|(_, total)| total.is_finite())
        .collect();
    top_n(pairs, n)
}

fn top_n(mut pairs: Vec<(String, f64)>, n: usize) -> Vec<Leader> {
    pairs.sort_by(|a, b| desc(a.1, b.1));
    pairs
        .into_iter()
        .take(n)
        .map(|(name, score)| Leader { name, score })
        .collect()
}
