//! Subcommand implementations and the output plumbing they share.

use std::path::Path;

use anyhow::{bail, Result};

pub mod analyze;
pub mod compare;
pub mod consolidate;
pub mod exams;
pub mod init;
pub mod validate;

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
    Markdown,
    Html,
}

impl Format {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            "markdown" | "md" => Ok(Format::Markdown),
            "html" => Ok(Format::Html),
            other => bail!("unknown format '{other}' (expected text, json, markdown or html)"),
        }
    }
}

/// Print `content` to stdout, or write it to `output` when given.
pub fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            examlens_report::write_report(content, path)?;
            eprintln!("Report written to: {}", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}
