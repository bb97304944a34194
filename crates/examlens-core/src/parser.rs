//! Input parsing: CSV score tables, free text, and manual mark lists.
//!
//! Tables are read with the `csv` crate. The name column is the first header
//! that looks like a name header, or else the first column without a single
//! numeric cell. Every other column holding at least one number is a score
//! column, except identifier columns such as `Roll` or `ID`. Cells that are empty or not numbers become missing scores; they
//! are never an error.

use std::borrow::Cow;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::Sheet;

/// Numeric headers that identify a student rather than score one
/// (case-insensitive).
const ID_HEADERS: &[&str] = &[
    "id", "roll", "roll no", "roll no.", "roll number", "roll_no", "no", "no.", "sno", "s.no",
    "sr no", "serial", "student id", "student_id", "admission no", "reg no", "registration no",
];

/// Headers recognised as the student name column (case-insensitive).
const NAME_HEADERS: &[&str] = &["name", "names", "student", "student name", "student_name", "full name"];

/// Headers preferred as the score column when only one is wanted.
const SCORE_HEADERS: &[&str] = &["score", "scores", "marks", "mark", "points"];

/// Largest value [`extract_numbers`] accepts, leaving room for bonus marks.
pub const MAX_EXTRACTED_MARK: f64 = 200.0;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").expect("number pattern is valid"));

static MARK_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;\s]+").expect("separator pattern is valid"));

/// A row-level problem found while reading a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    /// 1-based line number, header included.
    pub line: usize,
    pub message: String,
}

/// A parsed score table with its detected layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    pub headers: Vec<String>,
    pub name_column: Option<String>,
    pub score_columns: Vec<String>,
    /// Number of non-blank data rows.
    pub rows: usize,
    pub warnings: Vec<ParseWarning>,
    names: Vec<String>,
    /// `cells[c][r]` is row `r` of `score_columns[c]`.
    cells: Vec<Vec<Option<f64>>>,
}

impl ScoreTable {
    /// Parse CSV text. Fails only when there is no header row.
    pub fn parse_str(content: &str) -> Result<Self> {
        Self::from_reader(content.as_bytes(), sniff_delimiter(content))
    }

    fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .context("failed to read header row")?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if h.is_empty() {
                    format!("Column {}", i + 1)
                } else {
                    h.to_string()
                }
            })
            .collect();
        if headers.is_empty() {
            bail!("file is empty");
        }

        let mut raw_rows: Vec<Vec<String>> = Vec::new();
        let mut warnings = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            match result {
                Ok(record) => {
                    if record.iter().all(|cell| cell.is_empty()) {
                        continue;
                    }
                    raw_rows.push(record.iter().map(str::to_string).collect());
                }
                Err(err) => {
                    tracing::warn!(line = idx + 2, error = %err, "skipping unreadable row");
                    warnings.push(ParseWarning {
                        line: idx + 2,
                        message: err.to_string(),
                    });
                }
            }
        }

        let column = |c: usize| -> Vec<Option<f64>> {
            raw_rows
                .iter()
                .map(|row| row.get(c).and_then(|cell| parse_cell(cell)))
                .collect()
        };
        let numeric: Vec<bool> = (0..headers.len())
            .map(|c| column(c).iter().any(Option::is_some))
            .collect();

        let name_idx = headers
            .iter()
            .position(|h| NAME_HEADERS.iter().any(|n| h.eq_ignore_ascii_case(n)))
            .or_else(|| numeric.iter().position(|&is_numeric| !is_numeric));

        let is_id = |c: usize| ID_HEADERS.iter().any(|h| headers[c].eq_ignore_ascii_case(h));
        let score_idx: Vec<usize> = (0..headers.len())
            .filter(|&c| Some(c) != name_idx && numeric[c] && !is_id(c))
            .collect();

        if score_idx.is_empty() {
            tracing::warn!(?headers, "no numeric score column found");
        }
        if name_idx.is_none() && !score_idx.is_empty() {
            tracing::warn!("no name column found; rows will have blank names");
        }

        let names = raw_rows
            .iter()
            .map(|row| {
                name_idx
                    .and_then(|c| row.get(c))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect();

        let table = Self {
            name_column: name_idx.map(|c| headers[c].clone()),
            score_columns: score_idx.iter().map(|&c| headers[c].clone()).collect(),
            rows: raw_rows.len(),
            warnings,
            names,
            cells: score_idx.iter().map(|&c| column(c)).collect(),
            headers,
        };
        tracing::debug!(
            rows = table.rows,
            name_column = ?table.name_column,
            score_columns = ?table.score_columns,
            "parsed score table"
        );
        Ok(table)
    }

    /// The score column to use when only one is wanted.
    pub fn preferred_score_column(&self) -> Option<&str> {
        self.score_columns
            .iter()
            .find(|c| SCORE_HEADERS.iter().any(|s| c.eq_ignore_ascii_case(s)))
            .or_else(|| self.score_columns.first())
            .map(String::as_str)
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.score_columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column.trim()))
    }

    /// Cells of one score column that were empty or not numeric.
    pub fn missing_cells(&self, column: &str) -> usize {
        self.column_index(column)
            .map(|c| self.cells[c].iter().filter(|v| v.is_none()).count())
            .unwrap_or(0)
    }

    /// One score column as a sheet labelled `subject`.
    pub fn sheet(&self, column: &str, subject: &str) -> Option<Sheet> {
        let c = self.column_index(column)?;
        let mut sheet = Sheet::new(subject);
        for (name, score) in self.names.iter().zip(&self.cells[c]) {
            sheet.push(name.clone(), *score);
        }
        Some(sheet)
    }

    /// Every score column as its own sheet, labelled by its header.
    pub fn sheets(&self) -> Vec<Sheet> {
        self.score_columns
            .iter()
            .filter_map(|column| self.sheet(column, column))
            .collect()
    }
}

/// Read and parse a CSV file.
pub fn read_table(path: &Path) -> Result<ScoreTable> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let text = decode_text(&bytes);
    ScoreTable::parse_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Load sheets from one CSV file.
///
/// With a `subject` label the preferred score column becomes that subject;
/// without one every score column becomes its own subject.
pub fn load_sheets(path: &Path, subject: Option<&str>) -> Result<Vec<Sheet>> {
    let table = read_table(path)?;
    match subject {
        Some(label) => Ok(table
            .preferred_score_column()
            .and_then(|column| table.sheet(column, label))
            .into_iter()
            .collect()),
        None => Ok(table.sheets()),
    }
}

/// Load every `*.csv` file in `dir` as one sheet named after the file stem.
///
/// Files that cannot be read are skipped with a warning.
pub fn load_sheet_directory(dir: &Path) -> Result<Vec<Sheet>> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    paths.sort();

    let mut sheets = Vec::new();
    for path in paths {
        let Some(subject) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        match load_sheets(&path, Some(&subject)) {
            Ok(loaded) => sheets.extend(loaded),
            Err(e) => {
                tracing::warn!("skipping {}: {e:#}", path.display());
            }
        }
    }
    Ok(sheets)
}

/// Decode file bytes as UTF-8, falling back to Latin-1.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            tracing::debug!("input is not valid UTF-8, decoding as Latin-1");
            Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())
        }
    }
}

/// Every number in free text within `0..=MAX_EXTRACTED_MARK`, in order.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    NUMBER_RE
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| (0.0..=MAX_EXTRACTED_MARK).contains(v))
        .collect()
}

/// Parse a manually entered list like `"50, 60 72.5; 80"`.
pub fn parse_marks_list(text: &str) -> Result<Vec<f64>> {
    let mut marks = Vec::new();
    for token in MARK_SEPARATOR_RE.split(text.trim()).filter(|t| !t.is_empty()) {
        match token.parse::<f64>() {
            Ok(v) if v.is_finite() => marks.push(v),
            _ => bail!("invalid mark: {token:?}"),
        }
    }
    if marks.is_empty() {
        bail!("no marks given");
    }
    Ok(marks)
}

/// Marks inside the accepted range and how many fell outside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkValidation {
    pub valid: Vec<f64>,
    pub invalid_count: usize,
}

/// Keep the marks in `min..=max`; everything else (NaN included) is invalid.
pub fn validate_marks(marks: &[f64], min: f64, max: f64) -> MarkValidation {
    let valid: Vec<f64> = marks
        .iter()
        .copied()
        .filter(|v| (min..=max).contains(v))
        .collect();
    MarkValidation {
        invalid_count: marks.len() - valid.len(),
        valid,
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Semicolon when the header line has semicolons but no commas.
fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or_default();
    if header.contains(';') && !header.contains(',') {
        b';'
    } else {
        b','
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATH_CSV: &str = "\
Student Name,Roll,Score,Remarks
Alice,1,80,good
Bob,2,,absent
Cara,3,abc,
Dan,4,72.5,
,,,
";

    #[test]
    fn detects_name_and_score_columns() {
        let table = ScoreTable::parse_str(MATH_CSV).unwrap();
        assert_eq!(table.name_column.as_deref(), Some("Student Name"));
        assert_eq!(table.score_columns, vec!["Score"]);
        assert_eq!(table.preferred_score_column(), Some("Score"));
        assert_eq!(table.rows, 4);
        assert_eq!(table.missing_cells("Score"), 2);
    }

    #[test]
    fn identifier_columns_are_not_subjects() {
        let table =
            ScoreTable::parse_str("ID,Name,Math,Roll No,Science\n7,Ann,50,101,60\n8,Ben,70,102,65\n")
                .unwrap();
        assert_eq!(table.score_columns, vec!["Math", "Science"]);
        let subjects: Vec<String> = table.sheets().into_iter().map(|s| s.subject).collect();
        assert_eq!(subjects, vec!["Math", "Science"]);
    }

    #[test]
    fn sheet_keeps_missing_scores_as_none() {
        let table = ScoreTable::parse_str(MATH_CSV).unwrap();
        let sheet = table.sheet("score", "Math").unwrap();
        assert_eq!(sheet.subject, "Math");
        let scores: Vec<Option<f64>> = sheet.rows.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![Some(80.0), None, None, Some(72.5)]);
        assert_eq!(sheet.rows[3].name, "Dan");
    }

    #[test]
    fn name_column_falls_back_to_first_text_column() {
        let table = ScoreTable::parse_str("Pupil,Math,Science\nAnn,50,60\nBen,70,\n").unwrap();
        assert_eq!(table.name_column.as_deref(), Some("Pupil"));
        let sheets = table.sheets();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[1].subject, "Science");
        assert_eq!(sheets[1].rows[1].score, None);
    }

    #[test]
    fn table_without_scores_yields_no_sheets() {
        let table = ScoreTable::parse_str("Name,Comment\nAnn,great\n").unwrap();
        assert!(table.score_columns.is_empty());
        assert!(table.sheets().is_empty());
        assert_eq!(table.preferred_score_column(), None);
    }

    #[test]
    fn semicolon_delimited_input() {
        let table = ScoreTable::parse_str("Name;Marks\nAnn;55\n").unwrap();
        assert_eq!(table.score_columns, vec!["Marks"]);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(ScoreTable::parse_str("").is_err());
    }

    #[test]
    fn latin1_fallback() {
        let bytes = b"Name,Score\nJos\xE9,70\n";
        let text = decode_text(bytes);
        assert!(text.contains("José"));
        let table = ScoreTable::parse_str(&text).unwrap();
        assert_eq!(table.sheets()[0].rows[0].name, "José");
    }

    #[test]
    fn bom_is_stripped() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFName"), "Name");
    }

    #[test]
    fn load_sheets_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marks.csv");
        std::fs::write(&path, MATH_CSV).unwrap();

        let labelled = load_sheets(&path, Some("Math")).unwrap();
        assert_eq!(labelled.len(), 1);
        assert_eq!(labelled[0].subject, "Math");

        let wide = load_sheets(&path, None).unwrap();
        assert_eq!(wide.len(), 1);
        assert_eq!(wide[0].subject, "Score");
    }

    #[test]
    fn directory_of_sheets_named_by_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Science.csv"), "Name,Score\nAnn,60\n").unwrap();
        std::fs::write(dir.path().join("Math.csv"), "Name,Score\nAnn,70\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let sheets = load_sheet_directory(dir.path()).unwrap();
        let subjects: Vec<&str> = sheets.iter().map(|s| s.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Math", "Science"]);
    }

    #[test]
    fn extract_numbers_in_range() {
        let text = "Roll 12: scored 87.5 out of 100; bonus 250, id 2024";
        assert_eq!(extract_numbers(text), vec![12.0, 87.5, 100.0]);
    }

    #[test]
    fn manual_marks_list() {
        assert_eq!(
            parse_marks_list(" 50, 60 72.5;80 ").unwrap(),
            vec![50.0, 60.0, 72.5, 80.0]
        );
        assert!(parse_marks_list("50, abc").is_err());
        assert!(parse_marks_list("  ").is_err());
    }

    #[test]
    fn validate_marks_counts_out_of_range() {
        let result = validate_marks(&[-1.0, 0.0, 50.0, 100.0, 101.0, f64::NAN], 0.0, 100.0);
        assert_eq!(result.valid, vec![0.0, 50.0, 100.0]);
        assert_eq!(result.invalid_count, 3);
    }
}
