//! The `examlens init` command.

use anyhow::{Context, Result};

use examlens_store::config::STARTER_CONFIG;

pub fn execute() -> Result<()> {
    let path = std::path::Path::new("examlens.toml");
    if path.exists() {
        println!("examlens.toml already exists, skipping.");
    } else {
        std::fs::write(path, STARTER_CONFIG).context("failed to write examlens.toml")?;
        println!("Created examlens.toml");
    }

    println!("\nNext steps:");
    println!("  1. Adjust max_marks and thresholds in examlens.toml");
    println!("  2. Run: examlens analyze --marks \"45, 67, 82, 91\"");
    println!("  3. Run: examlens consolidate --sheet Math=math.csv --exam Midterm --save");

    Ok(())
}
