//! Letter grades, grade distributions, and pass/fail counts.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Letter grade bands by percentage of maximum marks. Each band includes its
/// lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    /// 95% and above.
    #[serde(rename = "A+")]
    APlus,
    /// 85% and above.
    #[serde(rename = "A")]
    A,
    /// 75% and above.
    #[serde(rename = "B+")]
    BPlus,
    /// 65% and above.
    #[serde(rename = "B")]
    B,
    /// 55% and above.
    #[serde(rename = "C+")]
    CPlus,
    /// 45% and above.
    #[serde(rename = "C")]
    C,
    /// 35% and above.
    #[serde(rename = "D")]
    D,
    #[serde(rename = "F")]
    F,
}

impl LetterGrade {
    /// Every grade, best first.
    pub const ALL: [LetterGrade; 8] = [
        LetterGrade::APlus,
        LetterGrade::A,
        LetterGrade::BPlus,
        LetterGrade::B,
        LetterGrade::CPlus,
        LetterGrade::C,
        LetterGrade::D,
        LetterGrade::F,
    ];

    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 95.0 {
            LetterGrade::APlus
        } else if percentage >= 85.0 {
            LetterGrade::A
        } else if percentage >= 75.0 {
            LetterGrade::BPlus
        } else if percentage >= 65.0 {
            LetterGrade::B
        } else if percentage >= 55.0 {
            LetterGrade::CPlus
        } else if percentage >= 45.0 {
            LetterGrade::C
        } else if percentage >= 35.0 {
            LetterGrade::D
        } else {
            LetterGrade::F
        }
    }

    /// Grade for `score` out of `max_marks`.
    pub fn for_score(score: f64, max_marks: f64) -> Self {
        Self::from_percentage(percentage_of(score, max_marks))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::BPlus => "B+",
            LetterGrade::B => "B",
            LetterGrade::CPlus => "C+",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LetterGrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LetterGrade::ALL
            .iter()
            .copied()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown letter grade: {s}"))
    }
}

/// `score` as a percentage of `max_marks` (0 when `max_marks` is not positive).
pub fn percentage_of(score: f64, max_marks: f64) -> f64 {
    if max_marks > 0.0 {
        score / max_marks * 100.0
    } else {
        0.0
    }
}

/// How many scores fall in each grade band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeDistribution {
    /// Count per grade; every grade is present, zero-filled.
    pub counts: BTreeMap<LetterGrade, usize>,
    /// Share of the sample per grade, in percent.
    pub percentages: BTreeMap<LetterGrade, f64>,
    pub total: usize,
}

pub fn grade_distribution(scores: &[f64], max_marks: f64) -> GradeDistribution {
    let mut counts: BTreeMap<LetterGrade, usize> =
        LetterGrade::ALL.iter().map(|&g| (g, 0)).collect();
    for &score in scores {
        *counts
            .entry(LetterGrade::for_score(score, max_marks))
            .or_default() += 1;
    }

    let total = scores.len();
    let percentages = counts
        .iter()
        .map(|(&grade, &count)| {
            let pct = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            };
            (grade, pct)
        })
        .collect();

    GradeDistribution {
        counts,
        percentages,
        total,
    }
}

/// Pass/fail split against a percentage threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassFailStats {
    /// Raw score needed to pass.
    pub pass_mark: f64,
    pub passed_count: usize,
    pub failed_count: usize,
    pub pass_rate: f64,
    pub fail_rate: f64,
}

/// A score passes when it reaches `pass_threshold` percent of `max_marks`.
pub fn pass_fail(scores: &[f64], pass_threshold: f64, max_marks: f64) -> PassFailStats {
    let pass_mark = pass_threshold / 100.0 * max_marks;
    let passed_count = scores.iter().filter(|&&s| s >= pass_mark).count();
    let failed_count = scores.len() - passed_count;
    let pass_rate = if scores.is_empty() {
        0.0
    } else {
        passed_count as f64 / scores.len() as f64 * 100.0
    };

    PassFailStats {
        pass_mark,
        passed_count,
        failed_count,
        pass_rate,
        fail_rate: 100.0 - pass_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_lower_bounds_are_inclusive() {
        assert_eq!(LetterGrade::from_percentage(95.0), LetterGrade::APlus);
        assert_eq!(LetterGrade::from_percentage(94.999), LetterGrade::A);
        assert_eq!(LetterGrade::from_percentage(85.0), LetterGrade::A);
        assert_eq!(LetterGrade::from_percentage(75.0), LetterGrade::BPlus);
        assert_eq!(LetterGrade::from_percentage(65.0), LetterGrade::B);
        assert_eq!(LetterGrade::from_percentage(55.0), LetterGrade::CPlus);
        assert_eq!(LetterGrade::from_percentage(45.0), LetterGrade::C);
        assert_eq!(LetterGrade::from_percentage(35.0), LetterGrade::D);
        assert_eq!(LetterGrade::from_percentage(34.9), LetterGrade::F);
    }

    #[test]
    fn grades_scale_with_max_marks() {
        assert_eq!(LetterGrade::for_score(38.0, 40.0), LetterGrade::APlus);
        assert_eq!(LetterGrade::for_score(20.0, 40.0), LetterGrade::C);
    }

    #[test]
    fn grade_display_and_parse() {
        assert_eq!(LetterGrade::BPlus.to_string(), "B+");
        assert_eq!("a+".parse::<LetterGrade>().unwrap(), LetterGrade::APlus);
        assert!("E".parse::<LetterGrade>().is_err());
        assert_eq!(
            serde_json::to_string(&LetterGrade::CPlus).unwrap(),
            "\"C+\""
        );
    }

    #[test]
    fn distribution_is_zero_filled() {
        let dist = grade_distribution(&[96.0, 50.0, 52.0, 10.0], 100.0);
        assert_eq!(dist.counts.len(), 8);
        assert_eq!(dist.counts[&LetterGrade::APlus], 1);
        assert_eq!(dist.counts[&LetterGrade::C], 2);
        assert_eq!(dist.counts[&LetterGrade::B], 0);
        assert!((dist.percentages[&LetterGrade::C] - 50.0).abs() < 1e-9);
        assert_eq!(dist.total, 4);
    }

    #[test]
    fn pass_mark_is_inclusive() {
        let stats = pass_fail(&[50.0, 49.5, 80.0, 20.0], 50.0, 100.0);
        assert_eq!(stats.pass_mark, 50.0);
        assert_eq!(stats.passed_count, 2);
        assert_eq!(stats.failed_count, 2);
        assert!((stats.pass_rate - 50.0).abs() < 1e-9);
        assert!((stats.fail_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn pass_fail_empty() {
        let stats = pass_fail(&[], 40.0, 50.0);
        assert_eq!(stats.pass_mark, 20.0);
        assert_eq!(stats.pass_rate, 0.0);
        assert_eq!(stats.fail_rate, 100.0);
    }
}
