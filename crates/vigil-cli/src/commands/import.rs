//! Import command implementation

use std::path::Path;

use anyhow::{Context, Result};
use vigil_core::import::import_csv_file;
use vigil_core::models::YearMonth;
use vigil_core::{AlertService, ImportStats};

/// Import a CSV file for one user, then recompute the current month
pub fn cmd_import(
    service: &AlertService,
    user_id: i64,
    file: &Path,
    skip_recompute: bool,
) -> Result<ImportStats> {
    println!("📥 Importing {}...", file.display());

    let stats = import_csv_file(service.db(), user_id, file)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    println!("✅ Import complete!");
    println!("   Parsed: {}", stats.parsed);
    println!("   Imported: {}", stats.inserted);
    println!("   Skipped (duplicates): {}", stats.duplicates);

    if stats.inserted > 0 && !skip_recompute {
        let month = YearMonth::current();
        println!();
        println!("🔍 Recomputing alerts for {}...", month);
        let result = service.recompute(user_id, month)?;
        println!(
            "   Generated: {} (replaced {}, {} ms)",
            result.generated, result.replaced, result.duration_ms
        );
    }

    Ok(stats)
}
