//! Report rendering for examlens.
//!
//! Markdown for terminals and pull requests, self-contained HTML for sharing.

use std::path::Path;

use anyhow::{Context, Result};

pub mod html;
pub mod markdown;

pub use html::{exam_html, progress_html, single_subject_html};
pub use markdown::{exam_markdown, progress_markdown, single_subject_markdown};

/// Write a rendered report to a file, creating parent directories.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_report_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.md");

        write_report("## Marks analysis\n", &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("## Marks analysis"));
    }

    #[test]
    fn write_report_into_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let err = write_report("x", &blocker.join("report.md")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to create"));
    }
}
