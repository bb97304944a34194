//! In-memory snapshot store for tests and embedding.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use examlens_core::report::ExamSnapshot;
use examlens_core::traits::{sort_summaries, ExamSummary, SnapshotStore};

use crate::exam_key;

/// Snapshots held in a mutex-guarded map; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: Mutex<BTreeMap<String, ExamSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, ExamSnapshot>>> {
        self.snapshots
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

impl SnapshotStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn put(&self, snapshot: &ExamSnapshot) -> Result<()> {
        let key = exam_key(&snapshot.exam_name)?;
        self.lock()?.insert(key, snapshot.clone());
        tracing::info!(exam = %snapshot.exam_name, "stored snapshot in memory");
        Ok(())
    }

    fn get(&self, exam_name: &str) -> Result<Option<ExamSnapshot>> {
        let key = exam_key(exam_name)?;
        Ok(self.lock()?.get(&key).cloned())
    }

    fn list(&self) -> Result<Vec<ExamSummary>> {
        let mut summaries: Vec<ExamSummary> = self.lock()?.values().map(ExamSummary::from).collect();
        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    fn remove(&self, exam_name: &str) -> Result<bool> {
        let key = exam_key(exam_name)?;
        Ok(self.lock()?.remove(&key).is_some())
    }
}
