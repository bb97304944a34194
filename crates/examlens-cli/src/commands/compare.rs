//! The `examlens compare` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examlens_core::engine::AnalysisEngine;
use examlens_core::report::ProgressReport;
use examlens_store::{create_store, load_config_from, require};

use super::{emit, Format};

pub fn execute(
    current: String,
    previous: String,
    format: String,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let format = Format::parse(&format)?;
    let config = load_config_from(config_path.as_deref())?;
    let store = create_store(&config.store);
    let engine = AnalysisEngine::new(config.analysis)?;

    let current = require(store.as_ref(), &current)?;
    let previous = require(store.as_ref(), &previous)?;
    let report = engine.compare(&current, &previous);

    let rendered = match format {
        Format::Text => render_text(&report),
        Format::Json => serde_json::to_string_pretty(&report)?,
        Format::Markdown => examlens_report::progress_markdown(&report),
        Format::Html => examlens_report::progress_html(&report),
    };
    emit(&rendered, output.as_deref())
}

fn render_text(report: &ProgressReport) -> String {
    let mut out = format!(
        "Progress: {} vs {}\n",
        report.current_exam, report.previous_exam
    );

    let Some(insights) = &report.insights else {
        out.push_str("No students appear in both exams; no comparison possible.\n");
        return out;
    };

    let mut students = Table::new();
    students.set_header(vec!["Student", "Previous", "Current", "Change", "Trend"]);
    for (name, p) in &report.progress.students {
        students.add_row(vec![
            Cell::new(name),
            Cell::new(format!("{:.1}", p.previous_total)),
            Cell::new(format!("{:.1}", p.current_total)),
            Cell::new(format!("{:+.1}", p.total_change)),
            Cell::new(p.overall_trend),
        ]);
    }
    out.push_str(&format!("\n{students}\n"));

    if !report.subject_averages.is_empty() {
        let mut subjects = Table::new();
        subjects.set_header(vec!["Subject", "Previous avg", "Current avg", "Change", "Trend"]);
        for (subject, a) in &report.subject_averages {
            subjects.add_row(vec![
                Cell::new(subject),
                Cell::new(format!("{:.1}", a.previous_avg)),
                Cell::new(format!("{:.1}", a.current_avg)),
                Cell::new(format!("{:+.1}", a.change)),
                Cell::new(a.trend),
            ]);
        }
        out.push_str(&format!("\n{subjects}\n"));
    }

    out.push_str(&format!(
        "\nClass trend: {} (average change {:+.1})\n",
        insights.overall_class_trend, insights.average_change
    ));
    out.push_str(&format!(
        "Most improved: {} ({:+.1})\nMost declined: {} ({:+.1})\n",
        insights.most_improved.name,
        insights.most_improved.total_change,
        insights.most_declined.name,
        insights.most_declined.total_change
    ));
    if !insights.consistent_performers.is_empty() {
        out.push_str(&format!(
            "Consistent: {}\n",
            insights.consistent_performers.join(", ")
        ));
    }

    let excluded = report.progress.current_only.len() + report.progress.previous_only.len();
    if excluded > 0 {
        out.push_str(&format!(
            "{excluded} student(s) appear in only one exam and were not compared\n"
        ));
    }
    out
}
