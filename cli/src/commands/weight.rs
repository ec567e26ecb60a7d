use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use weighboard_core::auth::Session;
use weighboard_core::models::RejectedRow;

use super::SheetBoard;
use super::helpers::{json_error, parse_date, to_kg, truncate};

pub(crate) fn cmd_weight_log(
    board: &SheetBoard,
    session: &Session,
    value: f64,
    unit: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let weight_kg = to_kg(value, unit)?;
    let date = parse_date(date)?;

    let record = board.register_weight(session, date, weight_kg)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!(
            "Logged {:.1} kg for {} on {}",
            record.weight_kg,
            record.user,
            record.date.format("%Y-%m-%d")
        );
    }

    Ok(())
}

pub(crate) fn cmd_weight_delete(board: &SheetBoard, session: &Session, json: bool) -> Result<()> {
    let deleted = board.delete_latest(session)?;

    match deleted {
        Some(record) if json => println!("{}", serde_json::json!({ "deleted": record })),
        Some(record) => println!(
            "Deleted {:.1} kg from {} for {}",
            record.weight_kg,
            record.date.format("%Y-%m-%d"),
            record.user
        ),
        None if json => println!("{}", json_error("No weigh-ins to delete")),
        None => eprintln!("No weigh-ins for {} to delete.", session.user()),
    }

    Ok(())
}

/// Show the cleaned sheet, newest first.
pub(crate) fn cmd_records(board: &SheetBoard, user: Option<&str>, json: bool) -> Result<()> {
    let snapshot = board.snapshot()?;
    let mut records = snapshot.table;
    if let Some(user) = user {
        let wanted = user.trim().to_lowercase();
        records.retain(|r| r.user.to_lowercase() == wanted);
    }
    records.reverse();

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        eprintln!("No weigh-ins found. Use `weighboard log` to record one.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct RecordRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "User")]
        user: String,
        #[tabled(rename = "Weight (kg)")]
        kg: String,
    }

    let rows: Vec<RecordRow> = records
        .iter()
        .map(|r| RecordRow {
            date: r.date.format("%Y-%m-%d").to_string(),
            user: truncate(&r.user, 24),
            kg: format!("{:.1}", r.weight_kg),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let skipped = snapshot.rejected.len();
    if skipped > 0 {
        eprintln!("{skipped} sheet row(s) could not be read. See `weighboard rejected`.");
    }

    Ok(())
}

#[derive(Tabled)]
struct RejectedTableRow {
    #[tabled(rename = "Index")]
    index: usize,
    #[tabled(rename = "Fecha")]
    date: String,
    #[tabled(rename = "Usuario")]
    user: String,
    #[tabled(rename = "Peso")]
    weight: String,
    #[tabled(rename = "Problem")]
    reason: String,
}

// Position in the stored table, counting from 0; not a file line number.
fn rejected_table_rows(rejected: &[RejectedRow]) -> Vec<RejectedTableRow> {
    rejected
        .iter()
        .map(|r| RejectedTableRow {
            index: r.source_row,
            date: truncate(&r.raw.date, 24),
            user: truncate(&r.raw.user, 24),
            weight: truncate(&r.raw.weight, 16),
            reason: r.reason.to_string(),
        })
        .collect()
}

/// Show sheet rows the normalizer dropped, with the reason.
pub(crate) fn cmd_rejected(board: &SheetBoard, json: bool) -> Result<()> {
    let rejected = board.snapshot()?.rejected;

    if json {
        println!("{}", serde_json::to_string_pretty(&rejected)?);
        return Ok(());
    }

    if rejected.is_empty() {
        println!("Every sheet row was read.");
        return Ok(());
    }

    let rows = rejected_table_rows(&rejected);
    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");

    Ok(())
}
