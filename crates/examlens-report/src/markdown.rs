//! Markdown rendering for analysis and progress reports.

use examlens_core::consolidate::ConsolidationWarning;
use examlens_core::grading::LetterGrade;
use examlens_core::history::ProgressInsights;
use examlens_core::ranking::Ranking;
use examlens_core::report::{ExamReport, ProgressReport, SingleSubjectReport};
use examlens_core::statistics::{ClassLevel, PerformanceInsight, StatsResult};

/// One-line reading of a performance insight.
pub fn describe_insight(insight: &PerformanceInsight) -> String {
    match insight {
        PerformanceInsight::ClassLevel {
            level,
            mean_percentage,
        } => {
            let verdict = match level {
                ClassLevel::Excellent => "Excellent class performance",
                ClassLevel::Good => "Good class performance",
                ClassLevel::Average => "Average class performance",
                ClassLevel::BelowAverage => "Below average class performance",
            };
            format!("{verdict} (mean {mean_percentage:.1}% of maximum marks)")
        }
        PerformanceInsight::HighVariability { std_dev } => {
            format!("High variability in scores (standard deviation {std_dev:.1})")
        }
        PerformanceInsight::ConsistentScores { std_dev } => {
            format!("Scores are tightly grouped (standard deviation {std_dev:.1})")
        }
        PerformanceInsight::RightSkewed { skewness } => {
            format!("Most students scored below the mean (skewness {skewness:.2})")
        }
        PerformanceInsight::LeftSkewed { skewness } => {
            format!("Most students scored above the mean (skewness {skewness:.2})")
        }
        PerformanceInsight::FrequentOutliers { percentage } => {
            format!("{percentage:.1}% of scores are outliers; check for data entry errors")
        }
    }
}

/// One-line reading of a consolidation warning.
pub fn describe_warning(warning: &ConsolidationWarning) -> String {
    match warning {
        ConsolidationWarning::AmbiguousIdentity { canonical, aliases } => format!(
            "{} spellings were merged into \"{canonical}\": {}",
            aliases.len(),
            aliases.join(", ")
        ),
        ConsolidationWarning::DuplicateEntry {
            student,
            subject,
            replaced,
            kept,
        } => format!("{student} has two {subject} scores; kept {kept} over {replaced}"),
        ConsolidationWarning::EmptySheet { subject } => {
            format!("sheet \"{subject}\" contributed no rows")
        }
    }
}

/// Escape `|` so a value cannot split a table cell.
fn cell(s: &str) -> String {
    s.replace('|', "\\|")
}

fn push_stats_table(md: &mut String, stats: &StatsResult) {
    let mode = stats
        .mode
        .map(|m| format!("{m:.2}"))
        .unwrap_or_else(|| "none".to_string());
    md.push_str("| Statistic | Value |\n|-----------|-------|\n");
    for (label, value) in [
        ("Count", stats.count.to_string()),
        ("Mean", format!("{:.2}", stats.mean)),
        ("Median", format!("{:.2}", stats.median)),
        ("Mode", mode),
        ("Std dev", format!("{:.2}", stats.std_dev)),
        ("Min", format!("{:.2}", stats.min)),
        ("Max", format!("{:.2}", stats.max)),
        ("Q1 / Q3", format!("{:.2} / {:.2}", stats.q1, stats.q3)),
        ("Skewness", format!("{:.3}", stats.skewness)),
        ("Kurtosis", format!("{:.3}", stats.kurtosis)),
        ("Outliers", stats.outliers.count.to_string()),
    ] {
        md.push_str(&format!("| {label} | {value} |\n"));
    }
    md.push('\n');
}

fn push_ranking_table(md: &mut String, ranking: &Ranking, with_subjects: bool) {
    if with_subjects {
        md.push_str("| Rank | Student | Total | % | Grade | Best | Worst |\n");
        md.push_str("|------|---------|-------|---|-------|------|-------|\n");
    } else {
        md.push_str("| Rank | Student | Score | % | Grade |\n");
        md.push_str("|------|---------|-------|---|-------|\n");
    }
    for e in &ranking.entries {
        md.push_str(&format!(
            "| {} | {} | {:.1} | {:.1}% | {} |",
            e.rank,
            cell(&e.name),
            e.score,
            e.percentage,
            e.grade
        ));
        if with_subjects {
            match &e.breakdown {
                Some(b) => md.push_str(&format!(
                    " {} | {} |",
                    cell(&b.best_subject),
                    cell(&b.worst_subject)
                )),
                None => md.push_str(" - | - |"),
            }
        }
        md.push('\n');
    }
    md.push('\n');
}

/// Markdown summary of a single-subject analysis.
pub fn single_subject_markdown(report: &SingleSubjectReport) -> String {
    let mut md = String::from("## Marks analysis\n\n");
    push_stats_table(&mut md, &report.stats);

    md.push_str(&format!(
        "**Pass/fail:** {} passed, {} failed ({:.1}% pass rate at {:.1} marks)\n\n",
        report.pass_fail.passed_count,
        report.pass_fail.failed_count,
        report.pass_fail.pass_rate,
        report.pass_fail.pass_mark
    ));

    md.push_str("### Grade distribution\n\n| Grade | Count | % |\n|-------|-------|---|\n");
    for grade in LetterGrade::ALL {
        let count = report.grade_distribution.counts.get(&grade).copied().unwrap_or(0);
        let pct = report.grade_distribution.percentages.get(&grade).copied().unwrap_or(0.0);
        md.push_str(&format!("| {grade} | {count} | {pct:.1}% |\n"));
    }
    md.push('\n');

    md.push_str("### Ranking\n\n");
    push_ranking_table(&mut md, &report.ranking, false);

    if !report.insights.is_empty() {
        md.push_str("### Insights\n\n");
        for insight in &report.insights {
            md.push_str(&format!("- {}\n", describe_insight(insight)));
        }
    }
    md
}

/// Markdown summary of a consolidated exam.
pub fn exam_markdown(report: &ExamReport) -> String {
    let mut md = format!(
        "## {} ({})\n\n",
        report.exam_name(),
        report.snapshot.exam_date
    );
    md.push_str(&format!(
        "**Students:** {} | **Rows:** {} read, {} accepted, {} skipped\n\n",
        report.snapshot.student_count(),
        report.rows_read,
        report.rows_accepted,
        report.skipped.len()
    ));

    if let Some(summary) = &report.class_summary {
        md.push_str(&format!(
            "**Class average:** {:.1} | **Highest:** {:.1} | **Lowest:** {:.1} | **Top performer:** {}\n\n",
            summary.class_average, summary.highest_score, summary.lowest_score, summary.top_performer
        ));
    }

    md.push_str("### Ranking\n\n");
    push_ranking_table(&mut md, &report.ranking, true);

    if !report.subject_summaries.is_empty() {
        md.push_str("### Subjects\n\n");
        md.push_str("| Subject | Count | Average | Highest | Lowest | Std dev |\n");
        md.push_str("|---------|-------|---------|---------|--------|---------|\n");
        for (subject, s) in &report.subject_summaries {
            md.push_str(&format!(
                "| {} | {} | {:.1} | {:.1} | {:.1} | {:.2} |\n",
                cell(subject),
                s.count, s.average, s.highest, s.lowest, s.std_dev
            ));
        }
        md.push('\n');
    }

    if !report.warnings.is_empty() || !report.skipped.is_empty() {
        md.push_str("### Data issues\n\n");
        for w in &report.warnings {
            md.push_str(&format!("- {}\n", describe_warning(w)));
        }
        for s in &report.skipped {
            md.push_str(&format!("- skipped {}: {}\n", s.item, s.reason));
        }
    }
    md
}

fn push_insights(md: &mut String, insights: &ProgressInsights) {
    md.push_str(&format!(
        "**Class trend:** {} (average change {:+.1})\n\n",
        insights.overall_class_trend, insights.average_change
    ));
    md.push_str(&format!(
        "- Most improved: {} ({:+.1})\n- Most declined: {} ({:+.1})\n",
        insights.most_improved.name,
        insights.most_improved.total_change,
        insights.most_declined.name,
        insights.most_declined.total_change
    ));
    if !insights.consistent_performers.is_empty() {
        md.push_str(&format!(
            "- Consistent: {}\n",
            insights.consistent_performers.join(", ")
        ));
    }
    md.push('\n');
}

/// Markdown summary of a progress comparison.
pub fn progress_markdown(report: &ProgressReport) -> String {
    let mut md = format!(
        "## Progress: {} vs {}\n\n",
        report.current_exam, report.previous_exam
    );

    let Some(insights) = &report.insights else {
        md.push_str("No students appear in both exams; no comparison possible.\n");
        return md;
    };
    push_insights(&mut md, insights);

    md.push_str("### Students\n\n| Student | Previous | Current | Change | Trend |\n");
    md.push_str("|---------|----------|---------|--------|-------|\n");
    for (name, p) in &report.progress.students {
        md.push_str(&format!(
            "| {} | {:.1} | {:.1} | {:+.1} | {} |\n",
            cell(name),
            p.previous_total, p.current_total, p.total_change, p.overall_trend
        ));
    }
    md.push('\n');

    if !report.subject_averages.is_empty() {
        md.push_str("### Subject averages\n\n| Subject | Previous | Current | Change | Trend |\n");
        md.push_str("|---------|----------|---------|--------|-------|\n");
        for (subject, a) in &report.subject_averages {
            md.push_str(&format!(
                "| {} | {:.1} | {:.1} | {:+.1} | {} |\n",
                cell(subject),
                a.previous_avg, a.current_avg, a.change, a.trend
            ));
        }
        md.push('\n');
    }

    let excluded = report.progress.current_only.len() + report.progress.previous_only.len();
    if excluded > 0 {
        md.push_str(&format!(
            "_{excluded} student(s) appear in only one exam and are not compared._\n"
        ));
    }
    md
}
