//! Core data model types for examlens.
//!
//! These are the plain value objects that flow between the input layer, the
//! engines, persistence, and presentation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved subject key holding the sum of a student's other subject scores.
pub const TOTAL_KEY: &str = "Total";

/// A consolidated exam: canonical student name → that student's record.
///
/// Ordered by name so every "first encountered" tie-break downstream is
/// deterministic.
pub type Snapshot = BTreeMap<String, StudentRecord>;

/// One student's scores keyed by subject, including the reserved `"Total"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentRecord(BTreeMap<String, f64>);

impl StudentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score recorded for `subject` (may be `"Total"`).
    pub fn get(&self, subject: &str) -> Option<f64> {
        self.0.get(subject).copied()
    }

    /// Record a score, returning the value it replaced.
    pub fn insert(&mut self, subject: impl Into<String>, score: f64) -> Option<f64> {
        self.0.insert(subject.into(), score)
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.0.contains_key(subject)
    }

    /// All entries, `"Total"` included, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Subject entries only, `"Total"` excluded, in key order.
    pub fn subjects(&self) -> impl Iterator<Item = (&str, f64)> {
        self.iter().filter(|(k, _)| *k != TOTAL_KEY)
    }

    pub fn subject_count(&self) -> usize {
        self.subjects().count()
    }

    /// Sum of every subject score, ignoring any stored total.
    pub fn subject_sum(&self) -> f64 {
        self.subjects().map(|(_, v)| v).sum()
    }

    /// The stored `"Total"` if present, otherwise the subject sum.
    pub fn total(&self) -> f64 {
        self.get(TOTAL_KEY).unwrap_or_else(|| self.subject_sum())
    }

    /// Overwrite `"Total"` with the subject sum and return it.
    pub fn recompute_total(&mut self) -> f64 {
        let total = self.subject_sum();
        self.0.insert(TOTAL_KEY.to_string(), total);
        total
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for StudentRecord {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// One uploaded table: a subject label and its `(name, score)` rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    /// Subject this sheet's scores belong to.
    pub subject: String,
    /// Rows in upload order.
    #[serde(default)]
    pub rows: Vec<SheetRow>,
}

impl Sheet {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            rows: Vec::new(),
        }
    }

    /// Build a sheet from complete `(name, score)` pairs.
    pub fn from_pairs<N, I>(subject: impl Into<String>, pairs: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, f64)>,
    {
        Self {
            subject: subject.into(),
            rows: pairs
                .into_iter()
                .map(|(name, score)| SheetRow::new(name, Some(score)))
                .collect(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, score: Option<f64>) {
        self.rows.push(SheetRow::new(name, score));
    }
}

/// A raw row. `score` is `None` when the cell was empty or not a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRow {
    pub name: String,
    pub score: Option<f64>,
}

impl SheetRow {
    pub fn new(name: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// An input item left out of a computation, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedItem {
    /// Human-readable locator, e.g. `"Math: row 4"` or a student name.
    pub item: String,
    pub reason: SkipReason,
}

impl SkippedItem {
    pub fn new(item: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            item: item.into(),
            reason,
        }
    }
}

/// Why an input item was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    BlankName,
    MissingScore,
    NonFiniteScore,
    BlankSubject,
    ReservedSubject,
    NoSubjectScores,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BlankName => write!(f, "blank student name"),
            SkipReason::MissingScore => write!(f, "missing score"),
            SkipReason::NonFiniteScore => write!(f, "score is not a finite number"),
            SkipReason::BlankSubject => write!(f, "blank subject label"),
            SkipReason::ReservedSubject => write!(f, "subject label \"{TOTAL_KEY}\" is reserved"),
            SkipReason::NoSubjectScores => write!(f, "no subject scores"),
        }
    }
}
