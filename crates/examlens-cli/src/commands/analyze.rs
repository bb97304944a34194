//! The `examlens analyze` command.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use comfy_table::{Cell, Table};

use examlens_core::engine::AnalysisEngine;
use examlens_core::grading::LetterGrade;
use examlens_core::parser;
use examlens_core::report::SingleSubjectReport;
use examlens_store::load_config_from;

use super::{emit, Format};

pub struct AnalyzeArgs {
    pub input: Option<PathBuf>,
    pub marks: Option<String>,
    pub column: Option<String>,
    pub max_marks: Option<f64>,
    pub pass_threshold: Option<f64>,
    pub format: String,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

pub fn execute(args: AnalyzeArgs) -> Result<()> {
    let format = Format::parse(&args.format)?;
    let mut config = load_config_from(args.config.as_deref())?.analysis;
    if let Some(max) = args.max_marks {
        config.max_marks = max;
    }
    if let Some(pass) = args.pass_threshold {
        config.pass_threshold = pass;
    }
    let engine = AnalysisEngine::new(config)?;

    let (scores, names) = match (&args.input, &args.marks) {
        (_, Some(text)) => (parser::parse_marks_list(text)?, None),
        (Some(path), None) => read_marks(path, args.column.as_deref())?,
        (None, None) => bail!("either --input or --marks is required"),
    };

    let max_marks = engine.config().max_marks;
    let above_max = scores.iter().filter(|&&s| s > max_marks).count();
    if above_max > 0 {
        tracing::warn!(count = above_max, max_marks, "marks above max_marks are analyzed as given");
    }
    let checked = parser::validate_marks(&scores, 0.0, f64::INFINITY);
    if checked.invalid_count > 0 {
        tracing::warn!(count = checked.invalid_count, "ignoring negative marks");
    }
    let names = names.map(|names| {
        names
            .into_iter()
            .zip(&scores)
            .filter(|(_, s)| **s >= 0.0)
            .map(|(n, _)| n)
            .collect::<Vec<_>>()
    });

    let report = engine.analyze_marks(&checked.valid, names.as_deref())?;

    let rendered = match format {
        Format::Text => render_text(&report),
        Format::Json => serde_json::to_string_pretty(&report)?,
        Format::Markdown => examlens_report::single_subject_markdown(&report),
        Format::Html => examlens_report::single_subject_html(&report),
    };
    emit(&rendered, args.output.as_deref())
}

/// Scores (and names, for CSV) from a file. `.txt` files are treated as
/// extracted document text.
fn read_marks(path: &std::path::Path, column: Option<&str>) -> Result<(Vec<f64>, Option<Vec<String>>)> {
    let is_text = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
    if is_text {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let marks = parser::extract_numbers(&parser::decode_text(&bytes));
        if marks.is_empty() {
            bail!("no marks found in {}", path.display());
        }
        return Ok((marks, None));
    }

    let table = parser::read_table(path)?;
    let column = match column {
        Some(c) => c,
        None => table
            .preferred_score_column()
            .with_context(|| format!("no numeric score column in {}", path.display()))?,
    };
    let sheet = table
        .sheet(column, column)
        .with_context(|| format!("no score column named '{column}' in {}", path.display()))?;

    let missing = table.missing_cells(column);
    if missing > 0 {
        tracing::warn!(column, missing, "skipping rows without a numeric score");
    }

    let mut scores = Vec::new();
    let mut names = Vec::new();
    for (i, row) in sheet.rows.iter().enumerate() {
        let Some(score) = row.score else { continue };
        scores.push(score);
        names.push(if row.name.is_empty() {
            format!("Student {}", i + 1)
        } else {
            row.name.clone()
        });
    }
    let names = table.name_column.is_some().then_some(names);
    Ok((scores, names))
}

fn render_text(report: &SingleSubjectReport) -> String {
    let stats = &report.stats;

    let mut summary = Table::new();
    summary.set_header(vec!["Count", "Mean", "Median", "Std dev", "Min", "Max", "Pass rate"]);
    summary.add_row(vec![
        Cell::new(stats.count),
        Cell::new(format!("{:.2}", stats.mean)),
        Cell::new(format!("{:.2}", stats.median)),
        Cell::new(format!("{:.2}", stats.std_dev)),
        Cell::new(format!("{:.2}", stats.min)),
        Cell::new(format!("{:.2}", stats.max)),
        Cell::new(format!("{:.1}%", report.pass_fail.pass_rate)),
    ]);

    let mut grades = Table::new();
    grades.set_header(LetterGrade::ALL.iter().map(|g| g.to_string()));
    grades.add_row(LetterGrade::ALL.iter().map(|g| {
        Cell::new(report.grade_distribution.counts.get(g).copied().unwrap_or(0))
    }));

    let mut ranking = Table::new();
    ranking.set_header(vec!["Rank", "Student", "Score", "%", "Grade"]);
    for e in &report.ranking.entries {
        ranking.add_row(vec![
            Cell::new(e.rank),
            Cell::new(&e.name),
            Cell::new(format!("{:.1}", e.score)),
            Cell::new(format!("{:.1}%", e.percentage)),
            Cell::new(e.grade),
        ]);
    }

    let mut out = format!("{summary}\n\nGrade distribution\n{grades}\n\n{ranking}\n");
    if stats.outliers.count > 0 {
        let values: Vec<String> = stats.outliers.values.iter().map(|v| format!("{v}")).collect();
        out.push_str(&format!("\nOutliers: {}\n", values.join(", ")));
    }
    for insight in &report.insights {
        out.push_str(&format!("- {}\n", examlens_report::markdown::describe_insight(insight)));
    }
    out
}
