//! The `examlens consolidate` command.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use comfy_table::{Cell, Table};

use examlens_core::engine::AnalysisEngine;
use examlens_core::model::Sheet;
use examlens_core::parser;
use examlens_core::report::ExamReport;
use examlens_store::{create_store, load_config_from};

use super::{emit, Format};

pub struct ConsolidateArgs {
    pub sheets: Vec<String>,
    pub wide: Vec<PathBuf>,
    pub dir: Option<PathBuf>,
    pub exam: String,
    pub date: Option<NaiveDate>,
    pub threshold: Option<f64>,
    pub max_marks: Option<f64>,
    pub save: bool,
    pub format: String,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Split a `SUBJECT=FILE` argument.
fn parse_sheet_arg(arg: &str) -> Result<(&str, PathBuf)> {
    let (subject, path) = arg
        .split_once('=')
        .with_context(|| format!("invalid --sheet '{arg}', expected SUBJECT=FILE"))?;
    let subject = subject.trim();
    anyhow::ensure!(!subject.is_empty(), "invalid --sheet '{arg}': subject is empty");
    Ok((subject, PathBuf::from(path.trim())))
}

pub fn execute(args: ConsolidateArgs) -> Result<()> {
    let format = Format::parse(&args.format)?;
    let settings = load_config_from(args.config.as_deref())?;
    let mut config = settings.analysis;
    if let Some(threshold) = args.threshold {
        config.similarity_threshold = threshold;
    }
    if let Some(max) = args.max_marks {
        config.max_marks = max;
    }
    let engine = AnalysisEngine::new(config)?;

    let mut sheets: Vec<Sheet> = Vec::new();
    for arg in &args.sheets {
        let (subject, path) = parse_sheet_arg(arg)?;
        let loaded = parser::load_sheets(&path, Some(subject))?;
        if loaded.is_empty() {
            tracing::warn!(subject, path = %path.display(), "sheet has no score column");
            sheets.push(Sheet::new(subject));
        }
        sheets.extend(loaded);
    }
    for path in &args.wide {
        sheets.extend(parser::load_sheets(path, None)?);
    }
    if let Some(dir) = &args.dir {
        sheets.extend(parser::load_sheet_directory(dir)?);
    }
    if sheets.is_empty() {
        bail!("no sheets given; use --sheet SUBJECT=FILE, --wide FILE or --dir DIR");
    }

    let report = engine.analyze_sheets(&args.exam, args.date, &sheets)?;

    if args.save {
        let store = create_store(&settings.store);
        store.put(&report.snapshot)?;
        eprintln!(
            "Saved exam '{}' ({} students) to the {} store",
            report.exam_name(),
            report.snapshot.student_count(),
            store.name()
        );
    }

    let rendered = match format {
        Format::Text => render_text(&report),
        Format::Json => serde_json::to_string_pretty(&report)?,
        Format::Markdown => examlens_report::exam_markdown(&report),
        Format::Html => examlens_report::exam_html(&report),
    };
    emit(&rendered, args.output.as_deref())
}

fn render_text(report: &ExamReport) -> String {
    let subjects: Vec<&String> = report.subject_summaries.keys().collect();

    let mut table = Table::new();
    let mut header = vec!["Rank".to_string(), "Student".to_string()];
    header.extend(subjects.iter().map(|s| s.to_string()));
    header.extend(["Total".to_string(), "%".to_string(), "Grade".to_string()]);
    table.set_header(header);

    for e in &report.ranking.entries {
        let record = report.snapshot.students.get(&e.name);
        let mut row = vec![Cell::new(e.rank), Cell::new(&e.name)];
        for subject in &subjects {
            let score = record.and_then(|r| r.get(subject));
            row.push(Cell::new(
                score.map(|s| format!("{s:.1}")).unwrap_or_else(|| "-".into()),
            ));
        }
        row.push(Cell::new(format!("{:.1}", e.score)));
        row.push(Cell::new(format!("{:.1}%", e.percentage)));
        row.push(Cell::new(e.grade));
        table.add_row(row);
    }

    let mut out = format!(
        "{} ({}): {} students from {} rows ({} skipped)\n\n{table}\n",
        report.exam_name(),
        report.snapshot.exam_date,
        report.snapshot.student_count(),
        report.rows_read,
        report.skipped.len()
    );

    let merged: Vec<_> = report.clusters.iter().filter(|c| c.aliases.len() > 1).collect();
    if !merged.is_empty() {
        out.push_str("\nMerged spellings:\n");
        for cluster in merged {
            out.push_str(&format!(
                "  {} <- {}\n",
                cluster.canonical,
                cluster.aliases.join(", ")
            ));
        }
    }
    if !report.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for w in &report.warnings {
            out.push_str(&format!(
                "  {}\n",
                examlens_report::markdown::describe_warning(w)
            ));
        }
    }
    out
}
