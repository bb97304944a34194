//! The `examlens validate` command.

use std::path::PathBuf;

use anyhow::Result;

use examlens_core::parser;

pub fn execute(input: PathBuf) -> Result<()> {
    let table = parser::read_table(&input)?;

    println!("Sheet: {} ({} rows)", input.display(), table.rows);
    match &table.name_column {
        Some(column) => println!("  Name column: {column}"),
        None => println!("  WARNING: no name column; students will be unnamed"),
    }

    let mut issues = table.warnings.len();
    for w in &table.warnings {
        println!("  line {} WARNING: {}", w.line, w.message);
    }

    if table.score_columns.is_empty() {
        println!("  WARNING: no numeric score column found");
        issues += 1;
    }
    for column in &table.score_columns {
        let missing = table.missing_cells(column);
        if missing > 0 {
            println!("  Score column: {column} ({missing} missing or non-numeric)");
            issues += 1;
        } else {
            println!("  Score column: {column}");
        }
    }

    if issues == 0 {
        println!("Sheet valid.");
    } else {
        println!("\n{issues} issue(s) found.");
    }
    Ok(())
}
