//! Descriptive statistics over a single set of exam scores.
//!
//! Conventions:
//! - variance and standard deviation use the sample estimator (`n - 1`
//!   denominator) and are 0 for a single score;
//! - percentiles interpolate linearly between order statistics at rank
//!   `p / 100 * (n - 1)`; Q1 and Q3 are the 25th and 75th percentiles;
//! - skewness is the adjusted Fisher-Pearson coefficient
//!   `G1 = g1 * sqrt(n(n-1)) / (n-2)` (0 when `n < 3`);
//! - kurtosis is the sample excess kurtosis
//!   `G2 = ((n+1) g2 + 6) (n-1) / ((n-2)(n-3))` (0 when `n < 4`),
//!   where `g1`, `g2` are the population moment ratios;
//! - outliers lie strictly outside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Percentiles reported on every [`StatsResult`].
pub const PERCENTILE_LADDER: [u8; 11] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 95, 99];

/// IQR multiplier for the outlier fences.
pub const OUTLIER_FENCE_FACTOR: f64 = 1.5;

/// Summary statistics for one set of scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsResult {
    /// Number of finite scores analyzed.
    pub count: usize,
    /// Number of NaN / infinite entries discarded before analysis.
    pub discarded: usize,
    pub mean: f64,
    pub median: f64,
    /// Most frequent score, only when it occurs at least twice.
    pub mode: Option<f64>,
    pub std_dev: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub percentiles: Vec<PercentilePoint>,
    pub skewness: f64,
    pub kurtosis: f64,
    pub outliers: OutlierReport,
    /// The analyzed scores in input order.
    pub scores: Vec<f64>,
}

impl StatsResult {
    /// Value at one of the [`PERCENTILE_LADDER`] rungs.
    pub fn percentile(&self, p: u8) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|point| point.percentile == p)
            .map(|point| point.value)
    }
}

/// One rung of the percentile ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentilePoint {
    pub percentile: u8,
    pub value: f64,
}

/// Scores outside the IQR fences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    /// Outlying scores in input order.
    pub values: Vec<f64>,
    pub count: usize,
    /// Share of the sample that is outlying, in percent.
    pub percentage: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
}

/// Compute the full statistics bundle.
///
/// Non-finite entries are discarded first; fails with
/// [`AnalysisError::EmptyInput`] when nothing remains.
pub fn analyze(scores: &[f64]) -> Result<StatsResult, AnalysisError> {
    let clean: Vec<f64> = scores.iter().copied().filter(|v| v.is_finite()).collect();
    let discarded = scores.len() - clean.len();
    if clean.is_empty() {
        return Err(AnalysisError::EmptyInput { discarded });
    }
    if discarded > 0 {
        tracing::debug!(discarded, "discarded non-finite scores before analysis");
    }

    let mut sorted = clean.clone();
    sorted.sort_by(cmp_f64);

    let n = sorted.len();
    let mean = mean(&clean);
    let variance = sample_variance(&clean, mean);
    let min = sorted[0];
    let max = sorted[n - 1];
    let q1 = percentile_sorted(&sorted, 25.0);
    let q3 = percentile_sorted(&sorted, 75.0);
    let iqr = q3 - q1;

    let percentiles = PERCENTILE_LADDER
        .iter()
        .map(|&p| PercentilePoint {
            percentile: p,
            value: percentile_sorted(&sorted, f64::from(p)),
        })
        .collect();

    let lower_fence = q1 - OUTLIER_FENCE_FACTOR * iqr;
    let upper_fence = q3 + OUTLIER_FENCE_FACTOR * iqr;
    let outlier_values: Vec<f64> = clean
        .iter()
        .copied()
        .filter(|&v| v < lower_fence || v > upper_fence)
        .collect();
    let outlier_count = outlier_values.len();

    Ok(StatsResult {
        count: n,
        discarded,
        mean,
        median: percentile_sorted(&sorted, 50.0),
        mode: mode_sorted(&sorted),
        std_dev: variance.sqrt(),
        variance,
        min,
        max,
        range: max - min,
        q1,
        q3,
        iqr,
        percentiles,
        skewness: skewness(&clean, mean),
        kurtosis: excess_kurtosis(&clean, mean),
        outliers: OutlierReport {
            values: outlier_values,
            count: outlier_count,
            percentage: outlier_count as f64 / n as f64 * 100.0,
            lower_fence,
            upper_fence,
        },
        scores: clean,
    })
}

/// Arithmetic mean. Returns 0.0 if the slice is empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance around `mean`; 0.0 for fewer than two values.
pub fn sample_variance(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Percentile with linear interpolation. `p` is in [0, 100].
/// Returns 0.0 if the slice is empty.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(cmp_f64);
    percentile_sorted(&sorted, p)
}

/// Percentile over an already ascending, non-empty slice.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = p.clamp(0.0, 100.0) / 100.0 * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

/// Most frequent value when it repeats; ties go to the smallest value.
fn mode_sorted(sorted: &[f64]) -> Option<f64> {
    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let value = sorted[i];
        let run = sorted[i..].iter().take_while(|&&v| v == value).count();
        if best.map_or(true, |(_, count)| run > count) {
            best = Some((value, run));
        }
        i += run;
    }
    best.filter(|&(_, count)| count >= 2).map(|(value, _)| value)
}

/// Population central moment of order `k`.
fn central_moment(values: &[f64], mean: f64, k: i32) -> f64 {
    values.iter().map(|v| (v - mean).powi(k)).sum::<f64>() / values.len() as f64
}

fn skewness(values: &[f64], mean: f64) -> f64 {
    let n = values.len() as f64;
    let m2 = central_moment(values, mean, 2);
    if values.len() < 3 || m2 == 0.0 {
        return 0.0;
    }
    let g1 = central_moment(values, mean, 3) / m2.powf(1.5);
    g1 * (n * (n - 1.0)).sqrt() / (n - 2.0)
}

fn excess_kurtosis(values: &[f64], mean: f64) -> f64 {
    let n = values.len() as f64;
    let m2 = central_moment(values, mean, 2);
    if values.len() < 4 || m2 == 0.0 {
        return 0.0;
    }
    let g2 = central_moment(values, mean, 4) / (m2 * m2) - 3.0;
    ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}

fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// How the class did overall, by mean percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassLevel {
    /// Mean at or above 80%.
    Excellent,
    /// Mean at or above 70%.
    Good,
    /// Mean at or above 60%.
    Average,
    BelowAverage,
}

/// A categorical observation about a score distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PerformanceInsight {
    ClassLevel { level: ClassLevel, mean_percentage: f64 },
    /// Standard deviation above 15 marks.
    HighVariability { std_dev: f64 },
    /// Standard deviation below 5 marks.
    ConsistentScores { std_dev: f64 },
    /// Skewness above 0.5: most students below the mean.
    RightSkewed { skewness: f64 },
    /// Skewness below -0.5: most students above the mean.
    LeftSkewed { skewness: f64 },
    /// More than 10% of scores are outliers; worth checking for entry errors.
    FrequentOutliers { percentage: f64 },
}

/// Derive distribution insights from an analysis.
pub fn performance_insights(stats: &StatsResult, max_marks: f64) -> Vec<PerformanceInsight> {
    let mean_percentage = if max_marks > 0.0 {
        stats.mean / max_marks * 100.0
    } else {
        0.0
    };
    let level = if mean_percentage >= 80.0 {
        ClassLevel::Excellent
    } else if mean_percentage >= 70.0 {
        ClassLevel::Good
    } else if mean_percentage >= 60.0 {
        ClassLevel::Average
    } else {
        ClassLevel::BelowAverage
    };

    let mut insights = vec![PerformanceInsight::ClassLevel {
        level,
        mean_percentage,
    }];

    if stats.std_dev > 15.0 {
        insights.push(PerformanceInsight::HighVariability {
            std_dev: stats.std_dev,
        });
    } else if stats.std_dev < 5.0 {
        insights.push(PerformanceInsight::ConsistentScores {
            std_dev: stats.std_dev,
        });
    }

    if stats.skewness > 0.5 {
        insights.push(PerformanceInsight::RightSkewed {
            skewness: stats.skewness,
        });
    } else if stats.skewness < -0.5 {
        insights.push(PerformanceInsight::LeftSkewed {
            skewness: stats.skewness,
        });
    }

    if stats.outliers.percentage > 10.0 {
        insights.push(PerformanceInsight::FrequentOutliers {
            percentage: stats.outliers.percentage,
        });
    }

    insights
}
