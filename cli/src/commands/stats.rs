use anyhow::Result;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use weighboard_core::models::{RankBy, UserStats};

use super::SheetBoard;
use super::helpers::{signed, truncate};

fn rank_label(by: RankBy) -> &'static str {
    match by {
        RankBy::LastInterval => "since last weigh-in",
        RankBy::TotalLost => "total lost",
        RankBy::PercentLost => "percent lost",
    }
}

pub(crate) fn cmd_stats(board: &SheetBoard, by: &str, json: bool) -> Result<()> {
    let by = RankBy::parse(by)?;
    let leaderboard = board.leaderboard()?;
    let ranked = leaderboard.ranked(by);

    if json {
        #[derive(Serialize)]
        struct StatsOutput<'a> {
            ranked_by: RankBy,
            users: Vec<&'a UserStats>,
            total_group_change: f64,
        }
        let out = StatsOutput {
            ranked_by: by,
            users: ranked,
            total_group_change: leaderboard.total_group_change,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if ranked.is_empty() {
        eprintln!("No weigh-ins yet. Use `weighboard log` to record one.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct StatsRow {
        #[tabled(rename = "#")]
        rank: usize,
        #[tabled(rename = "User")]
        user: String,
        #[tabled(rename = "Current (kg)")]
        current: String,
        #[tabled(rename = "Last change")]
        interval: String,
        #[tabled(rename = "Total lost")]
        total: String,
        #[tabled(rename = "% lost")]
        percent: String,
        #[tabled(rename = "Entries")]
        entries: usize,
    }

    let rows: Vec<StatsRow> = ranked
        .iter()
        .enumerate()
        .map(|(i, s)| StatsRow {
            rank: i + 1,
            user: truncate(&s.user, 24),
            current: format!("{:.1}", s.current_weight),
            interval: signed(s.last_interval_change),
            total: signed(s.total_change),
            percent: format!("{}%", signed(s.percent_change)),
            entries: s.entry_count,
        })
        .collect();

    println!("Ranking by {}\n", rank_label(by));
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!(
        "\n  GROUP TOTAL: {} kg",
        signed(leaderboard.total_group_change)
    );

    Ok(())
}
