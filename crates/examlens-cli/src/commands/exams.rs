//! The `examlens exams` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examlens_store::{create_store, load_config_from, StoreError};

pub fn execute(remove: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let store = create_store(&config.store);

    if let Some(name) = remove {
        if store.remove(&name)? {
            println!("Removed exam '{name}'");
            return Ok(());
        }
        return Err(StoreError::NotFound(name).into());
    }

    let summaries = store.list()?;
    if summaries.is_empty() {
        println!("No stored exams. Run `examlens consolidate --save` to store one.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Exam", "Date", "Students", "Stored at"]);
    for s in &summaries {
        table.add_row(vec![
            Cell::new(&s.exam_name),
            Cell::new(s.exam_date),
            Cell::new(s.student_count),
            Cell::new(s.stored_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");
    Ok(())
}
