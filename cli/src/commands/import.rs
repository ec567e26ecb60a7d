use std::path::Path;

use anyhow::{Context, Result};

use weighboard_core::csv_store::parse_store_csv;

use super::SheetBoard;
use super::helpers::json_error;

pub fn cmd_import(board: &SheetBoard, path: &Path, dry_run: bool, json: bool) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let rows = parse_store_csv(file)?;

    if rows.is_empty() {
        if json {
            println!("{}", json_error("No rows found in CSV file"));
        } else {
            eprintln!("No rows found in CSV file.");
        }
        return Ok(());
    }

    let summary = board.import_rows(rows, dry_run)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        if dry_run {
            println!("Dry run — no changes made.\n");
        } else {
            println!("Import complete.\n");
        }
        println!("  Rows read:     {}", summary.rows_read);
        println!("  Readable rows: {}", summary.rows_accepted);
        println!("  Unreadable:    {}", summary.rows_rejected);
        println!("  Users:         {}", summary.users_seen);
        if summary.rows_rejected > 0 && !dry_run {
            println!("\nUnreadable rows are kept in the sheet; see `weighboard rejected`.");
        }
    }

    Ok(())
}
