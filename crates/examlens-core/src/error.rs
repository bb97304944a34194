//! Analysis error types.
//!
//! Only conditions that make a computation meaningless are errors. Messy
//! input (blank names, non-numeric cells, students missing from one side of a
//! comparison) degrades by exclusion and is reported through the diagnostics
//! carried on each result instead.

use thiserror::Error;

/// Errors raised by the statistics and ranking engines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// No finite score was left after discarding missing and NaN entries.
    #[error("no valid scores to analyze ({discarded} non-finite value(s) discarded)")]
    EmptyInput { discarded: usize },

    /// The maximum marks used for percentages must be positive and finite.
    #[error("maximum marks must be a positive number, got {0}")]
    InvalidMaxMarks(f64),

    /// Name similarity thresholds are ratios in `[0, 1]`.
    #[error("similarity threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    /// Pass thresholds are percentages in `[0, 100]`.
    #[error("pass threshold must be within [0, 100], got {0}")]
    InvalidPassThreshold(f64),

    /// Trend thresholds and the consistency band are non-negative distances.
    #[error("{name} must be a non-negative number, got {value}")]
    InvalidTrendThreshold { name: &'static str, value: f64 },
}

impl AnalysisError {
    /// Returns `true` for errors caused by empty or fully-invalid data rather
    /// than by configuration.
    pub fn is_empty_input(&self) -> bool {
        matches!(self, AnalysisError::EmptyInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_message_mentions_discarded() {
        let err = AnalysisError::EmptyInput { discarded: 2 };
        assert!(err.to_string().contains("2 non-finite"));
        assert!(err.is_empty_input());
        assert!(!AnalysisError::InvalidMaxMarks(0.0).is_empty_input());
    }
}
