//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use std::collections::BTreeMap;

use serde::Serialize;

use examlens_core::grading::LetterGrade;
use examlens_core::ranking::Ranking;
use examlens_core::report::{ExamReport, ProgressReport, SingleSubjectReport};

use crate::markdown::{describe_insight, describe_warning};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn open_document(html: &mut String, title: &str, meta: &str) {
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!("<title>examlens: {}</title>\n", html_escape(title)));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");
    html.push_str("<header>\n");
    html.push_str(&format!("<h1>{}</h1>\n", html_escape(title)));
    html.push_str(&format!("<p class=\"meta\">{meta}</p>\n"));
    html.push_str("</header>\n");
}

fn close_document<T: Serialize>(html: &mut String, raw: &T) {
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(&serde_json::to_string_pretty(raw).unwrap_or_default()));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");
    html.push_str("</body>\n</html>");
}

fn ranking_table(html: &mut String, ranking: &Ranking, with_subjects: bool) {
    html.push_str("<table class=\"sortable\" id=\"ranking\">\n<thead><tr>");
    let mut headers = vec!["Rank", "Student", "Score", "%", "Grade"];
    if with_subjects {
        headers.extend(["Best subject", "Worst subject"]);
    }
    for (i, h) in headers.iter().enumerate() {
        html.push_str(&format!("<th onclick=\"sortTable('ranking', {i})\">{h}</th>"));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for e in &ranking.entries {
        let class = grade_class(e.grade);
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{:.1}</td><td>{:.1}</td><td class=\"{class}\">{}</td>",
            e.rank,
            html_escape(&e.name),
            e.score,
            e.percentage,
            e.grade
        ));
        if with_subjects {
            let (best, worst) = e
                .breakdown
                .as_ref()
                .map(|b| (html_escape(&b.best_subject), html_escape(&b.worst_subject)))
                .unwrap_or_else(|| ("-".into(), "-".into()));
            html.push_str(&format!("<td>{best}</td><td>{worst}</td>"));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody></table>\n");
}

fn grade_class(grade: LetterGrade) -> &'static str {
    match grade {
        LetterGrade::APlus | LetterGrade::A | LetterGrade::BPlus => "pass",
        LetterGrade::D | LetterGrade::F => "fail",
        _ => "",
    }
}

/// Horizontal bars, one per label, scaled to the largest value.
fn generate_bar_chart(bars: &[(String, f64)], suffix: &str) -> String {
    let bar_height = 24;
    let max_width = 400;
    let padding = 8;
    let label_width = 160;

    let largest = bars.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let total_height = bars.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 80,
        total_height
    );

    for (i, (label, value)) in bars.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let width = if largest > 0.0 {
            (value / largest * max_width as f64) as usize
        } else {
            0
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(label)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"#3b82f6\" rx=\"4\"/>\n",
            label_width, y, width, bar_height
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{:.1}{}</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            value,
            suffix
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

fn grade_bars(counts: &BTreeMap<LetterGrade, usize>) -> Vec<(String, f64)> {
    LetterGrade::ALL
        .iter()
        .map(|g| (g.to_string(), counts.get(g).copied().unwrap_or(0) as f64))
        .collect()
}

/// Generate an HTML page for a single-subject analysis.
pub fn single_subject_html(report: &SingleSubjectReport) -> String {
    let mut html = String::new();
    let stats = &report.stats;
    open_document(
        &mut html,
        "Marks analysis",
        &format!(
            "{} scores | out of {} | {}",
            stats.count,
            report.max_marks,
            report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
    );

    html.push_str("<section class=\"dashboard\">\n<h2>Summary</h2>\n<table class=\"summary\">\n");
    let mode = stats
        .mode
        .map(|m| format!("{m:.2}"))
        .unwrap_or_else(|| "none".into());
    for (label, value) in [
        ("Mean", format!("{:.2}", stats.mean)),
        ("Median", format!("{:.2}", stats.median)),
        ("Mode", mode),
        ("Std dev", format!("{:.2}", stats.std_dev)),
        ("Range", format!("{:.2} to {:.2}", stats.min, stats.max)),
        ("IQR", format!("{:.2}", stats.iqr)),
        ("Pass rate", format!("{:.1}%", report.pass_fail.pass_rate)),
        ("Outliers", stats.outliers.count.to_string()),
    ] {
        html.push_str(&format!("<tr><th>{label}</th><td>{value}</td></tr>\n"));
    }
    html.push_str("</table>\n");
    html.push_str("<h3>Grade distribution</h3>\n");
    html.push_str(&generate_bar_chart(&grade_bars(&report.grade_distribution.counts), ""));
    html.push_str("</section>\n");

    if !report.insights.is_empty() {
        html.push_str("<section class=\"insights\">\n<h2>Insights</h2>\n<ul>\n");
        for insight in &report.insights {
            html.push_str(&format!("<li>{}</li>\n", html_escape(&describe_insight(insight))));
        }
        html.push_str("</ul>\n</section>\n");
    }

    html.push_str("<section class=\"results\">\n<h2>Ranking</h2>\n");
    ranking_table(&mut html, &report.ranking, false);
    html.push_str("</section>\n");

    close_document(&mut html, report);
    html
}

/// Generate an HTML page for a consolidated exam.
pub fn exam_html(report: &ExamReport) -> String {
    let mut html = String::new();
    open_document(
        &mut html,
        report.exam_name(),
        &format!(
            "{} | {} students | {} subjects",
            report.snapshot.exam_date,
            report.snapshot.student_count(),
            report.subject_summaries.len()
        ),
    );

    html.push_str("<section class=\"dashboard\">\n<h2>Subject averages</h2>\n");
    let averages: Vec<(String, f64)> = report
        .subject_summaries
        .iter()
        .map(|(subject, s)| (subject.clone(), s.average))
        .collect();
    if !averages.is_empty() {
        html.push_str(&generate_bar_chart(&averages, ""));
    }
    if let Some(summary) = &report.class_summary {
        html.push_str(&format!(
            "<p>Class average <strong>{:.1}</strong>, top performer <strong>{}</strong></p>\n",
            summary.class_average,
            html_escape(&summary.top_performer)
        ));
    }
    html.push_str("</section>\n");

    html.push_str("<section class=\"results\">\n<h2>Ranking</h2>\n");
    ranking_table(&mut html, &report.ranking, true);
    html.push_str("</section>\n");

    if !report.warnings.is_empty() || !report.skipped.is_empty() {
        html.push_str("<section class=\"issues\">\n<h2>Data issues</h2>\n<ul>\n");
        for w in &report.warnings {
            html.push_str(&format!("<li>{}</li>\n", html_escape(&describe_warning(w))));
        }
        for s in &report.skipped {
            html.push_str(&format!(
                "<li>skipped {}: {}</li>\n",
                html_escape(&s.item),
                s.reason
            ));
        }
        html.push_str("</ul>\n</section>\n");
    }

    close_document(&mut html, report);
    html
}

/// Generate an HTML page for a progress comparison.
pub fn progress_html(report: &ProgressReport) -> String {
    let mut html = String::new();
    open_document(
        &mut html,
        &format!("{} vs {}", report.current_exam, report.previous_exam),
        &format!("{} students compared", report.progress.len()),
    );

    match &report.insights {
        None => html.push_str("<p>No students appear in both exams; no comparison possible.</p>\n"),
        Some(insights) => {
            html.push_str(&format!(
                "<section class=\"dashboard\">\n<p>Class trend: <strong>{}</strong> (average change {:+.1})</p>\n",
                insights.overall_class_trend, insights.average_change
            ));
            html.push_str(&format!(
                "<p>Most improved: {} ({:+.1}); most declined: {} ({:+.1})</p>\n</section>\n",
                html_escape(&insights.most_improved.name),
                insights.most_improved.total_change,
                html_escape(&insights.most_declined.name),
                insights.most_declined.total_change
            ));

            html.push_str("<section class=\"results\">\n<h2>Students</h2>\n");
            html.push_str("<table class=\"sortable\" id=\"progress\">\n<thead><tr>");
            for (i, h) in ["Student", "Previous", "Current", "Change", "Trend"].iter().enumerate() {
                html.push_str(&format!("<th onclick=\"sortTable('progress', {i})\">{h}</th>"));
            }
            html.push_str("</tr></thead>\n<tbody>\n");
            for (name, p) in &report.progress.students {
                let class = match p.overall_trend {
                    examlens_core::history::Trend::Improved => "pass",
                    examlens_core::history::Trend::Declined => "fail",
                    examlens_core::history::Trend::Stable => "",
                };
                html.push_str(&format!(
                    "<tr class=\"{class}\"><td>{}</td><td>{:.1}</td><td>{:.1}</td><td>{:+.1}</td><td>{}</td></tr>\n",
                    html_escape(name),
                    p.previous_total,
                    p.current_total,
                    p.total_change,
                    p.overall_trend
                ));
            }
            html.push_str("</tbody></table>\n</section>\n");
        }
    }

    close_document(&mut html, report);
    html
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); }
.sortable th { cursor: pointer; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(id, col) {
  const table = document.getElementById(id);
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    const cmp = isNaN(na) || isNaN(nb) ? va.localeCompare(vb) : na - nb;
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use examlens_core::engine::{AnalysisConfig, AnalysisEngine};
    use examlens_core::model::Sheet;

    fn engine() -> AnalysisEngine {
        AnalysisEngine::new(AnalysisConfig::default()).unwrap()
    }

    fn make_exam() -> ExamReport {
        let sheets = vec![
            Sheet::from_pairs("Math", [("Alice <A>", 90.0), ("Bob", 55.0)]),
            Sheet::from_pairs("Science", [("Alice <A>", 80.0), ("Bob", 61.0)]),
        ];
        engine().analyze_sheets("Finals & Co", None, &sheets).unwrap()
    }

    #[test]
    fn single_subject_page_contains_required_elements() {
        let report = engine().analyze_marks(&[40.0, 75.0, 91.0], None).unwrap();
        let html = single_subject_html(&report);

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("Grade distribution"));
        assert!(html.contains("<svg"));
        assert!(html.contains("Student 3"));
    }

    #[test]
    fn exam_page_escapes_names() {
        let html = exam_html(&make_exam());
        assert!(html.contains("Finals &amp; Co"));
        assert!(html.contains("Alice &lt;A&gt;"));
        assert!(!html.contains("Alice <A>"));
    }

    #[test]
    fn progress_page_without_overlap() {
        let exam = make_exam().snapshot;
        let other = examlens_core::report::ExamSnapshot::new("Other", None, Default::default());
        let html = progress_html(&engine().compare(&other, &exam));
        assert!(html.contains("no comparison possible"));
    }

    #[test]
    fn bar_chart_handles_all_zero() {
        let svg = generate_bar_chart(&[("A".into(), 0.0), ("B".into(), 0.0)], "");
        assert!(svg.contains("width=\"0\""));
    }
}
