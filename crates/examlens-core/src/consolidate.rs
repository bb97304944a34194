//! Merge per-subject sheets into one multi-subject snapshot.
//!
//! Raw names are grouped greedily: walking the distinct names in order, each
//! name not yet grouped anchors a cluster that absorbs every other ungrouped
//! name whose similarity to the anchor reaches the threshold. The longest
//! member becomes the canonical name. Grouping is O(n²) in distinct names and
//! depends on input order (the first-seen name anchors); enable
//! [`Consolidator::sort_names`] for an order-independent result.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::matcher::{normalize_name, SequenceMatcher};
use crate::model::{Sheet, SkipReason, SkippedItem, Snapshot, TOTAL_KEY};
use crate::traits::NameMatcher;

/// Default minimum similarity for two raw names to share an identity.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Default cluster size at which an identity is flagged as ambiguous.
pub const DEFAULT_AMBIGUOUS_CLUSTER_SIZE: usize = 3;

/// Raw names resolved to one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameCluster {
    pub canonical: String,
    /// Every raw spelling in the cluster, anchor first.
    pub aliases: Vec<String>,
}

/// Non-fatal conditions noticed while consolidating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsolidationWarning {
    /// A cluster absorbed unexpectedly many spellings.
    AmbiguousIdentity {
        canonical: String,
        aliases: Vec<String>,
    },
    /// The same student appeared twice for one subject; the later row won.
    DuplicateEntry {
        student: String,
        subject: String,
        replaced: f64,
        kept: f64,
    },
    /// A sheet contributed no usable rows.
    EmptySheet { subject: String },
}

/// A consolidated snapshot plus everything needed to judge its completeness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consolidation {
    pub snapshot: Snapshot,
    pub clusters: Vec<NameCluster>,
    pub warnings: Vec<ConsolidationWarning>,
    pub skipped: Vec<SkippedItem>,
    /// Rows seen across all sheets.
    pub rows_read: usize,
    /// Rows recorded into the snapshot (overwrites included).
    pub rows_accepted: usize,
}

impl Consolidation {
    /// Canonical name a raw spelling was resolved to.
    pub fn canonical_for(&self, raw_name: &str) -> Option<&str> {
        let raw_name = raw_name.trim();
        self.clusters
            .iter()
            .find(|c| c.aliases.iter().any(|a| a == raw_name))
            .map(|c| c.canonical.as_str())
    }

    /// True when some input was excluded or flagged.
    pub fn is_degraded(&self) -> bool {
        !self.skipped.is_empty() || !self.warnings.is_empty()
    }
}

/// Identity-resolving sheet merger.
pub struct Consolidator {
    threshold: f64,
    ambiguous_cluster_size: usize,
    sort_names: bool,
    matcher: Box<dyn NameMatcher>,
}

impl std::fmt::Debug for Consolidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consolidator")
            .field("threshold", &self.threshold)
            .field("ambiguous_cluster_size", &self.ambiguous_cluster_size)
            .field("sort_names", &self.sort_names)
            .field("matcher", &self.matcher.name())
            .finish()
    }
}

impl Default for Consolidator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            ambiguous_cluster_size: DEFAULT_AMBIGUOUS_CLUSTER_SIZE,
            sort_names: false,
            matcher: Box::new(SequenceMatcher),
        }
    }
}

impl Consolidator {
    /// Create a consolidator merging names at or above `threshold`.
    pub fn new(threshold: f64) -> Result<Self, AnalysisError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AnalysisError::InvalidThreshold(threshold));
        }
        Ok(Self {
            threshold,
            ..Self::default()
        })
    }

    /// Replace the name similarity function.
    pub fn with_matcher(mut self, matcher: impl NameMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// Flag clusters with at least `size` spellings (0 disables the check).
    pub fn with_ambiguous_cluster_size(mut self, size: usize) -> Self {
        self.ambiguous_cluster_size = size;
        self
    }

    /// Sort names before clustering so the result ignores upload order.
    pub fn sort_names(mut self, sort: bool) -> Self {
        self.sort_names = sort;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Group distinct raw names into identities.
    pub fn cluster_names(&self, names: &[String]) -> Vec<NameCluster> {
        let mut distinct: Vec<&str> = Vec::new();
        for name in names {
            let name = name.trim();
            if !name.is_empty() && !distinct.contains(&name) {
                distinct.push(name);
            }
        }
        if self.sort_names {
            distinct.sort_by(|a, b| {
                normalize_name(a)
                    .cmp(&normalize_name(b))
                    .then_with(|| a.cmp(b))
            });
        }

        let mut clustered = vec![false; distinct.len()];
        let mut clusters = Vec::new();

        for i in 0..distinct.len() {
            if clustered[i] {
                continue;
            }
            clustered[i] = true;
            let anchor = distinct[i];
            let mut aliases = vec![anchor.to_string()];

            for j in (i + 1)..distinct.len() {
                if clustered[j] {
                    continue;
                }
                if self.matcher.similarity(anchor, distinct[j]) >= self.threshold {
                    clustered[j] = true;
                    aliases.push(distinct[j].to_string());
                }
            }

            let canonical = longest(&aliases).to_string();
            if aliases.len() > 1 {
                tracing::debug!(%canonical, ?aliases, "merged name variants");
            }
            clusters.push(NameCluster { canonical, aliases });
        }

        clusters
    }

    /// Merge `sheets` into one snapshot and compute every student's total.
    pub fn consolidate(&self, sheets: &[Sheet]) -> Consolidation {
        let mut skipped = Vec::new();
        let mut warnings = Vec::new();

        // Sheets with an unusable subject label contribute nothing.
        let mut usable: Vec<(&str, &Sheet)> = Vec::new();
        for (idx, sheet) in sheets.iter().enumerate() {
            let subject = sheet.subject.trim();
            if subject.is_empty() {
                tracing::warn!(sheet = idx + 1, "skipping sheet without a subject label");
                skipped.push(SkippedItem::new(
                    format!("sheet {}", idx + 1),
                    SkipReason::BlankSubject,
                ));
            } else if subject.eq_ignore_ascii_case(TOTAL_KEY) {
                tracing::warn!(sheet = idx + 1, "skipping sheet labelled with the reserved total key");
                skipped.push(SkippedItem::new(
                    format!("sheet {} ({subject})", idx + 1),
                    SkipReason::ReservedSubject,
                ));
            } else {
                usable.push((subject, sheet));
            }
        }

        let raw_names: Vec<String> = usable
            .iter()
            .flat_map(|(_, sheet)| sheet.rows.iter().map(|r| r.name.clone()))
            .collect();
        let clusters = self.cluster_names(&raw_names);

        for cluster in &clusters {
            if self.ambiguous_cluster_size > 0 && cluster.aliases.len() >= self.ambiguous_cluster_size {
                tracing::warn!(
                    canonical = %cluster.canonical,
                    spellings = cluster.aliases.len(),
                    "identity cluster spans many spellings"
                );
                warnings.push(ConsolidationWarning::AmbiguousIdentity {
                    canonical: cluster.canonical.clone(),
                    aliases: cluster.aliases.clone(),
                });
            }
        }

        let canonical_of: HashMap<&str, &str> = clusters
            .iter()
            .flat_map(|c| c.aliases.iter().map(move |a| (a.as_str(), c.canonical.as_str())))
            .collect();

        let mut snapshot = Snapshot::new();
        let mut rows_read = 0usize;
        let mut rows_accepted = 0usize;

        for (subject, sheet) in &usable {
            let mut accepted_here = 0usize;

            for (row_idx, row) in sheet.rows.iter().enumerate() {
                rows_read += 1;
                let locator = || format!("{subject}: row {}", row_idx + 1);

                let name = row.name.trim();
                if name.is_empty() {
                    skipped.push(SkippedItem::new(locator(), SkipReason::BlankName));
                    continue;
                }
                let score = match row.score {
                    None => {
                        skipped.push(SkippedItem::new(
                            format!("{} ({name})", locator()),
                            SkipReason::MissingScore,
                        ));
                        continue;
                    }
                    Some(s) if !s.is_finite() => {
                        skipped.push(SkippedItem::new(
                            format!("{} ({name})", locator()),
                            SkipReason::NonFiniteScore,
                        ));
                        continue;
                    }
                    Some(s) => s,
                };

                let canonical = canonical_of.get(name).copied().unwrap_or(name);
                let record = snapshot.entry(canonical.to_string()).or_default();
                if let Some(replaced) = record.insert(*subject, score) {
                    tracing::warn!(student = canonical, subject, "duplicate score, keeping the later row");
                    warnings.push(ConsolidationWarning::DuplicateEntry {
                        student: canonical.to_string(),
                        subject: subject.to_string(),
                        replaced,
                        kept: score,
                    });
                }
                rows_accepted += 1;
                accepted_here += 1;
            }

            if accepted_here == 0 {
                tracing::warn!(subject, "sheet contributed no rows");
                warnings.push(ConsolidationWarning::EmptySheet {
                    subject: subject.to_string(),
                });
            }
        }

        for record in snapshot.values_mut() {
            record.recompute_total();
        }

        tracing::debug!(
            students = snapshot.len(),
            rows_read,
            rows_accepted,
            skipped = skipped.len(),
            "consolidated sheets"
        );

        Consolidation {
            snapshot,
            clusters,
            warnings,
            skipped,
            rows_read,
            rows_accepted,
        }
    }
}

/// Consolidate with the default matcher at `threshold`.
pub fn consolidate(sheets: &[Sheet], threshold: f64) -> Result<Consolidation, AnalysisError> {
    Ok(Consolidator::new(threshold)?.consolidate(sheets))
}

/// Longest string by character count; the earliest wins ties.
fn longest(names: &[String]) -> &str {
    let mut best = names[0].as_str();
    for name in &names[1..] {
        if name.chars().count() > best.chars().count() {
            best = name;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StudentRecord;

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn two_sheets_one_student() {
        let sheets = vec![
            Sheet::from_pairs("Math", [("Alice", 80.0)]),
            Sheet::from_pairs("Science", [("Alice", 70.0)]),
        ];
        let result = consolidate(&sheets, 0.8).unwrap();

        let expected: StudentRecord = [("Math", 80.0), ("Science", 70.0), ("Total", 150.0)]
            .into_iter()
            .collect();
        assert_eq!(result.snapshot.len(), 1);
        assert_eq!(result.snapshot["Alice"], expected);
        assert!(!result.is_degraded());
    }

    #[test]
    fn spelling_variants_collapse_to_longest() {
        let sheets = vec![
            Sheet::from_pairs("Math", [("Jon", 60.0), ("Maria Lopez", 90.0)]),
            Sheet::from_pairs("Science", [("Jonathan Smith", 75.0), ("maria lopez", 85.0)]),
        ];
        let result = consolidate(&sheets, 0.8).unwrap();

        assert_eq!(result.snapshot.len(), 2);
        let jon = &result.snapshot["Jonathan Smith"];
        assert_eq!(jon.get("Math"), Some(60.0));
        assert_eq!(jon.get("Science"), Some(75.0));
        assert_eq!(jon.get(TOTAL_KEY), Some(135.0));
        // equal length: the anchor spelling is kept
        assert_eq!(result.snapshot["Maria Lopez"].get(TOTAL_KEY), Some(175.0));
        assert_eq!(result.canonical_for("Jon"), Some("Jonathan Smith"));
    }

    #[test]
    fn dissimilar_names_stay_apart() {
        let consolidator = Consolidator::default();
        let clusters = consolidator.cluster_names(&names(&["Liam", "Noah", "Emma"]));
        assert_eq!(clusters.len(), 3);
        assert!(clusters.iter().all(|c| c.aliases.len() == 1));
    }

    #[test]
    fn first_seen_name_anchors_cluster() {
        // both longer spellings contain the anchor
        let consolidator = Consolidator::default().with_ambiguous_cluster_size(0);
        let clusters = consolidator.cluster_names(&names(&["Ann", "Annabel", "Anna"]));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].canonical, "Annabel");
        assert_eq!(clusters[0].aliases, names(&["Ann", "Annabel", "Anna"]));
    }

    #[test]
    fn sorted_clustering_ignores_input_order() {
        let consolidator = Consolidator::default().sort_names(true);
        let a = consolidator.cluster_names(&names(&["Bob Stone", "Alice Smith", "Alise Smith"]));
        let b = consolidator.cluster_names(&names(&["Alise Smith", "Bob Stone", "Alice Smith"]));
        assert_eq!(a, b);
        assert_eq!(a[0].aliases, names(&["Alice Smith", "Alise Smith"]));
    }

    #[test]
    fn threshold_one_requires_exact_names() {
        let sheets = vec![
            Sheet::from_pairs("Math", [("Alice Smith", 80.0)]),
            Sheet::from_pairs("Science", [("Alise Smith", 70.0)]),
        ];
        let result = consolidate(&sheets, 1.0).unwrap();
        assert_eq!(result.snapshot.len(), 2);
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        assert_eq!(
            Consolidator::new(1.5).unwrap_err(),
            AnalysisError::InvalidThreshold(1.5)
        );
    }

    #[test]
    fn messy_rows_are_skipped_not_fatal() {
        let mut math = Sheet::new("Math");
        math.push("Alice", Some(80.0));
        math.push("  ", Some(50.0));
        math.push("Bob", None);
        math.push("Cara", Some(f64::NAN));
        let result = consolidate(&[math], 0.8).unwrap();

        assert_eq!(result.snapshot.len(), 1);
        assert_eq!(result.rows_read, 4);
        assert_eq!(result.rows_accepted, 1);
        let reasons: Vec<SkipReason> = result.skipped.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::BlankName,
                SkipReason::MissingScore,
                SkipReason::NonFiniteScore
            ]
        );
    }

    #[test]
    fn duplicate_rows_last_write_wins_with_warning() {
        let sheets = vec![Sheet::from_pairs("Math", [("Alice", 40.0), ("alice", 90.0)])];
        let result = consolidate(&sheets, 0.8).unwrap();

        assert_eq!(result.snapshot["Alice"].get("Math"), Some(90.0));
        assert_eq!(result.snapshot["Alice"].get(TOTAL_KEY), Some(90.0));
        assert!(result.warnings.contains(&ConsolidationWarning::DuplicateEntry {
            student: "Alice".into(),
            subject: "Math".into(),
            replaced: 40.0,
            kept: 90.0,
        }));
    }

    #[test]
    fn unusable_sheets_contribute_nothing() {
        let sheets = vec![
            Sheet::from_pairs("", [("Alice", 40.0)]),
            Sheet::from_pairs("Total", [("Alice", 400.0)]),
            Sheet::new("Art"),
            Sheet::from_pairs("Math", [("Alice", 70.0)]),
        ];
        let result = consolidate(&sheets, 0.8).unwrap();

        assert_eq!(result.snapshot["Alice"].get(TOTAL_KEY), Some(70.0));
        assert_eq!(result.skipped.len(), 2);
        assert!(result.warnings.contains(&ConsolidationWarning::EmptySheet {
            subject: "Art".into()
        }));
    }

    #[test]
    fn large_clusters_are_flagged() {
        let sheets = vec![Sheet::from_pairs(
            "Math",
            [("Sam", 1.0), ("Samuel", 2.0), ("Samantha", 3.0)],
        )];
        let result = consolidate(&sheets, 0.8).unwrap();
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, ConsolidationWarning::AmbiguousIdentity { canonical, .. } if canonical == "Samantha")));
    }

    #[test]
    fn empty_input_gives_empty_snapshot() {
        let result = consolidate(&[], 0.8).unwrap();
        assert!(result.snapshot.is_empty());
        assert!(result.clusters.is_empty());
        assert_eq!(result.rows_read, 0);
    }
}
