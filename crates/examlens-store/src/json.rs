//! Snapshot store backed by a directory of JSON files.
//!
//! Each exam lives in `<dir>/<key>.json`. Writes go to a temporary file in
//! the same directory which is then renamed over the target, so a reader
//! sees either the old snapshot or the new one, never a partial write.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use examlens_core::report::ExamSnapshot;
use examlens_core::traits::{sort_summaries, ExamSummary, SnapshotStore};

use crate::exam_key;

#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    /// Use `dir`, creating it on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `exam_name`.
    pub fn path_for(&self, exam_name: &str) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}.json", exam_key(exam_name)?)))
    }

    fn read(path: &Path) -> Result<Option<ExamSnapshot>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read snapshot {}", path.display()))
            }
        };
        let snapshot = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
        Ok(Some(snapshot))
    }
}

impl SnapshotStore for JsonDirStore {
    fn name(&self) -> &str {
        "json"
    }

    fn put(&self, snapshot: &ExamSnapshot) -> Result<()> {
        let path = self.path_for(&snapshot.exam_name)?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create store directory {}", self.dir.display()))?;

        let tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("failed to create temp file in {}", self.dir.display()))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, snapshot).context("failed to serialize snapshot")?;
            writer.flush().context("failed to write snapshot")?;
        }
        tmp.as_file().sync_all().context("failed to sync snapshot")?;
        tmp.persist(&path)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to move snapshot into {}", path.display()))?;

        tracing::info!(exam = %snapshot.exam_name, path = %path.display(), "stored snapshot");
        Ok(())
    }

    fn get(&self, exam_name: &str) -> Result<Option<ExamSnapshot>> {
        Self::read(&self.path_for(exam_name)?)
    }

    fn list(&self) -> Result<Vec<ExamSummary>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read store directory {}", self.dir.display()))
            }
        };

        let mut summaries = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read(&path) {
                Ok(Some(snapshot)) => summaries.push(ExamSummary::from(&snapshot)),
                Ok(None) => {}
                Err(e) => tracing::warn!("skipping {}: {e:#}", path.display()),
            }
        }
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    fn remove(&self, exam_name: &str) -> Result<bool> {
        let path = self.path_for(exam_name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(exam = exam_name, "removed snapshot");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use examlens_core::model::{Snapshot, StudentRecord};

    fn make_snapshot(name: &str, day: u32) -> ExamSnapshot {
        let mut students = Snapshot::new();
        let record: StudentRecord = [("Math", 70.0), ("Total", 70.0)].into_iter().collect();
        students.insert("Alice".into(), record);
        ExamSnapshot::new(name, NaiveDate::from_ymd_opt(2024, 2, day), students)
    }

    #[test]
    fn round_trip_through_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path().join("data"));
        let snapshot = make_snapshot("Unit Test 1", 3);

        store.put(&snapshot).unwrap();
        assert!(dir.path().join("data").join("unit-test-1.json").exists());
        assert_eq!(store.get("Unit Test 1").unwrap(), Some(snapshot));
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.get("Midterm").unwrap(), None);
        assert!(!store.remove("Midterm").unwrap());
    }

    #[test]
    fn overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        store.put(&make_snapshot("Midterm", 1)).unwrap();
        store.put(&make_snapshot("Midterm", 2)).unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let stored = store.get("midterm").unwrap().unwrap();
        assert_eq!(stored.exam_date, NaiveDate::from_ymd_opt(2024, 2, 2).unwrap());
    }

    #[test]
    fn list_skips_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        store.put(&make_snapshot("Finals", 20)).unwrap();
        store.put(&make_snapshot("Quiz", 4)).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let summaries = store.list().unwrap();
        let names: Vec<&str> = summaries.iter().map(|s| s.exam_name.as_str()).collect();
        assert_eq!(names, vec!["Quiz", "Finals"]);
        assert_eq!(summaries[0].student_count, 1);
    }

    #[test]
    fn invalid_exam_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        assert!(store.put(&make_snapshot("???", 1)).is_err());
    }
}
