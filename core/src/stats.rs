use std::collections::BTreeMap;

use crate::models::{Leaderboard, RankBy, SeriesPoint, UserStats, WeightRecord};

fn group_by_user(table: &[WeightRecord]) -> BTreeMap<&str, Vec<&WeightRecord>> {
    let mut groups: BTreeMap<&str, Vec<&WeightRecord>> = BTreeMap::new();
    for record in table {
        groups.entry(record.user.as_str()).or_default().push(record);
    }
    groups
}

/// Summarize one user's records, given in table order. `None` for an empty slice.
fn user_stats(user: &str, records: &[&WeightRecord]) -> Option<UserStats> {
    let first = records.first()?;
    let last = records.last()?;

    let total_change = first.weight_kg - last.weight_kg;
    let last_interval_change = match records {
        [.., prev, last] => prev.weight_kg - last.weight_kg,
        _ => 0.0,
    };
    let percent_change = if first.weight_kg == 0.0 {
        0.0
    } else {
        total_change / first.weight_kg * 100.0
    };

    Some(UserStats {
        user: user.to_string(),
        current_weight: last.weight_kg,
        first_weight: first.weight_kg,
        total_change,
        last_interval_change,
        percent_change,
        entry_count: records.len(),
        first_date: first.date,
        last_date: last.date,
    })
}

/// Compute per-user stats and the group total from a normalized table.
///
/// Users are partitioned by exact (case-sensitive) name and emitted in name
/// order. "First" and "last" are positional within the table. Values are not
/// rounded.
#[must_use]
pub fn compute_leaderboard(table: &[WeightRecord]) -> Leaderboard {
    let users: Vec<UserStats> = group_by_user(table)
        .into_iter()
        .filter_map(|(user, records)| user_stats(user, &records))
        .collect();
    let total_group_change = users.iter().map(|u| u.total_change).sum();

    Leaderboard {
        users,
        total_group_change,
    }
}

impl Leaderboard {
    /// Users ordered best-first for a ranking category; ties go by name.
    #[must_use]
    pub fn ranked(&self, by: RankBy) -> Vec<&UserStats> {
        let mut ranked: Vec<&UserStats> = self.users.iter().collect();
        ranked.sort_by(|a, b| {
            by.key(b)
                .total_cmp(&by.key(a))
                .then_with(|| a.user.cmp(&b.user))
        });
        ranked
    }

    #[must_use]
    pub fn get(&self, user: &str) -> Option<&UserStats> {
        self.users.iter().find(|u| u.user == user)
    }
}

/// Weight-over-time points per user, for plotting one line per person.
#[must_use]
pub fn series_by_user(table: &[WeightRecord]) -> BTreeMap<String, Vec<SeriesPoint>> {
    group_by_user(table)
        .into_iter()
        .map(|(user, records)| {
            let points = records
                .iter()
                .map(|r| SeriesPoint {
                    date: r.date,
                    weight_kg: r.weight_kg,
                })
                .collect();
            (user.to_string(), points)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::RawRow;
    use crate::normalize::normalize;

    fn record(day: u32, user: &str, weight_kg: f64) -> WeightRecord {
        WeightRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            user: user.to_string(),
            weight_kg,
            source_row: 0,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_three_records() {
        let table = vec![
            record(1, "ana", 90.0),
            record(8, "ana", 88.0),
            record(15, "ana", 85.0),
        ];
        let board = compute_leaderboard(&table);
        let ana = board.get("ana").unwrap();

        assert!(close(ana.total_change, 5.0));
        assert!(close(ana.last_interval_change, 3.0));
        assert!((ana.percent_change - 5.56).abs() < 0.01);
        assert!(close(ana.current_weight, 85.0));
        assert_eq!(ana.entry_count, 3);
    }

    #[test]
    fn test_single_record() {
        let board = compute_leaderboard(&[record(1, "ana", 90.0)]);
        let ana = board.get("ana").unwrap();
        assert_eq!(ana.total_change, 0.0);
        assert_eq!(ana.last_interval_change, 0.0);
        assert_eq!(ana.percent_change, 0.0);
        assert_eq!(ana.entry_count, 1);
    }

    #[test]
    fn test_zero_first_weight_has_zero_percent() {
        let table = vec![record(1, "ana", 0.0), record(2, "ana", 80.0)];
        let board = compute_leaderboard(&table);
        assert_eq!(board.get("ana").unwrap().percent_change, 0.0);
    }

    #[test]
    fn test_weight_gain_is_negative() {
        let table = vec![record(1, "bea", 60.0), record(2, "bea", 61.5)];
        let bea = compute_leaderboard(&table).users.remove(0);
        assert!(close(bea.total_change, -1.5));
        assert!(close(bea.last_interval_change, -1.5));
    }

    #[test]
    fn test_group_total_is_sum_of_users() {
        let empty = compute_leaderboard(&[]);
        assert!(empty.users.is_empty());
        assert_eq!(empty.total_group_change, 0.0);

        let one = compute_leaderboard(&[record(1, "ana", 90.0), record(2, "ana", 87.5)]);
        assert!(close(one.total_group_change, 2.5));

        let table = vec![
            record(1, "ana", 90.0),
            record(1, "bea", 70.0),
            record(1, "carl", 100.0),
            record(9, "ana", 87.0),
            record(9, "bea", 71.0),
            record(9, "carl", 95.5),
        ];
        let many = compute_leaderboard(&table);
        let sum: f64 = many.users.iter().map(|u| u.total_change).sum();
        assert_eq!(many.users.len(), 3);
        assert!(close(many.total_group_change, sum));
        assert!(close(many.total_group_change, 3.0 - 1.0 + 4.5));
    }

    #[test]
    fn test_partition_is_case_sensitive() {
        let table = vec![record(1, "Ana", 80.0), record(2, "ana", 79.0)];
        let board = compute_leaderboard(&table);
        assert_eq!(board.users.len(), 2);
    }

    #[test]
    fn test_users_in_name_order() {
        let table = vec![record(1, "carl", 100.0), record(1, "ana", 80.0)];
        let names: Vec<String> = compute_leaderboard(&table)
            .users
            .into_iter()
            .map(|u| u.user)
            .collect();
        assert_eq!(names, vec!["ana", "carl"]);
    }

    #[test]
    fn test_ranked_by_category() {
        let table = vec![
            record(1, "ana", 100.0),
            record(1, "bea", 50.0),
            record(1, "carl", 80.0),
            record(8, "ana", 96.0),
            record(8, "bea", 47.0),
            record(8, "carl", 80.0),
        ];
        let board = compute_leaderboard(&table);

        let total: Vec<&str> = board
            .ranked(RankBy::TotalLost)
            .iter()
            .map(|u| u.user.as_str())
            .collect();
        assert_eq!(total, vec!["ana", "bea", "carl"]);

        let percent: Vec<&str> = board
            .ranked(RankBy::PercentLost)
            .iter()
            .map(|u| u.user.as_str())
            .collect();
        assert_eq!(percent, vec!["bea", "ana", "carl"]);
    }

    #[test]
    fn test_scenario_from_raw_sheet() {
        let rows = vec![
            RawRow::new("2024-01-01", "ana", "80,5"),
            RawRow::new("01/02/2024", "ana", "79.0"),
            RawRow::new("garbage", "ana", "50"),
        ];
        let normalized = normalize(&rows);
        let board = compute_leaderboard(&normalized.table);
        let ana = board.get("ana").unwrap();
        assert_eq!(ana.entry_count, 2);
        assert!(close(ana.total_change, 1.5));
    }

    #[test]
    fn test_series_by_user() {
        let table = vec![
            record(1, "ana", 90.0),
            record(1, "bea", 70.0),
            record(8, "ana", 89.0),
        ];
        let series = series_by_user(&table);
        assert_eq!(series.len(), 2);
        assert_eq!(series["ana"].len(), 2);
        assert_eq!(series["ana"][1].weight_kg, 89.0);
        assert_eq!(series["bea"][0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}
