use chrono::{Datelike, NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::models::{Normalized, RawRow, RejectReason, RejectedRow, WeightRecord};

/// Date layouts seen in the sheet. Day-first comes before ISO.
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"];

/// Two-digit-year layouts, tried once every four-digit layout has failed.
const SHORT_YEAR_FORMATS: &[&str] = &["%d/%m/%y", "%d-%m-%y"];

/// Time-of-day suffixes tolerated after a date. The time itself is discarded.
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%H:%M:%S%.f"];

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"\d*\.?\d+").expect("regex is valid");
}

/// Parse a weight cell.
///
/// Accepts `94.6`, `94,6`, `" 94,6 kg "`, `,5` and similar. The first decimal
/// or integer found after swapping commas for periods wins.
#[must_use]
pub fn parse_weight(raw: &str) -> Option<f64> {
    let text = raw.trim().replace(',', ".");
    let m = NUMBER.find(&text)?;
    m.as_str().parse::<f64>().ok().filter(|w| w.is_finite())
}

// `%Y` takes any digit count, so `01/02/24` would otherwise land in year 24.
fn parse_date_only(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .find(|date| (1000..=9999).contains(&date.year()))
        .or_else(|| {
            SHORT_YEAR_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        })
}

/// Parse a date cell, dropping any time-of-day component.
///
/// Handles `DD/MM/YYYY`, `DD/MM/YY`, `YYYY-MM-DD`, `YYYY-MM-DD H:MM` and
/// `YYYY-MM-DDTHH:MM:SS`. Years must have four digits or two; two-digit years
/// follow chrono's `%y` pivot (`24` is 2024).
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(date) = parse_date_only(s) {
        return Some(date);
    }

    let (date_part, time_part) = s.split_once(|c: char| c == 'T' || c.is_whitespace())?;
    let date = parse_date_only(date_part)?;
    let time_part = time_part.trim().trim_end_matches('Z');
    TIME_FORMATS
        .iter()
        .any(|fmt| NaiveTime::parse_from_str(time_part, fmt).is_ok())
        .then_some(date)
}

fn admit(raw: &RawRow) -> Result<(NaiveDate, String, f64), RejectReason> {
    let date = parse_date(&raw.date).ok_or(RejectReason::BadDate)?;
    let weight = parse_weight(&raw.weight).ok_or(RejectReason::BadWeight)?;
    let user = raw.user.trim();
    if user.is_empty() {
        return Err(RejectReason::MissingUser);
    }
    Ok((date, user.to_string(), weight))
}

/// Clean a raw sheet into a sorted table of weigh-ins.
///
/// Never fails: rows with a bad date, bad weight, or no user are moved to
/// `rejected` whole. The table is ordered by date, then user; rows that tie on
/// both keep their sheet order.
#[must_use]
pub fn normalize(rows: &[RawRow]) -> Normalized {
    let mut table = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();

    for (source_row, raw) in rows.iter().enumerate() {
        match admit(raw) {
            Ok((date, user, weight_kg)) => table.push(WeightRecord {
                date,
                user,
                weight_kg,
                source_row,
            }),
            Err(reason) => {
                debug!(source_row, ?raw, %reason, "dropping sheet row");
                rejected.push(RejectedRow {
                    source_row,
                    raw: raw.clone(),
                    reason,
                });
            }
        }
    }

    table.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.user.cmp(&b.user)));

    Normalized { table, rejected }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_weight_comma_matches_period() {
        assert_eq!(parse_weight("94,6"), Some(94.6));
        assert_eq!(parse_weight("94.6"), Some(94.6));
        assert_eq!(parse_weight("94,6"), parse_weight("94.6"));
    }

    #[test]
    fn test_parse_weight_with_noise() {
        assert_eq!(parse_weight("  82.3 kg"), Some(82.3));
        assert_eq!(parse_weight("peso: 77,25kg"), Some(77.25));
        assert_eq!(parse_weight("90"), Some(90.0));
    }

    #[test]
    fn test_parse_weight_leading_decimal_point() {
        assert_eq!(parse_weight(".5"), Some(0.5));
        assert_eq!(parse_weight(",5 kg"), Some(0.5));
        assert_eq!(parse_weight("94."), Some(94.0));
    }

    #[test]
    fn test_parse_weight_unparsable() {
        assert_eq!(parse_weight(""), None);
        assert_eq!(parse_weight("   "), None);
        assert_eq!(parse_weight("n/a"), None);
    }

    #[test]
    fn test_parse_date_iso() {
        assert_eq!(parse_date("2024-01-15"), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_parse_date_day_first() {
        assert_eq!(parse_date("01/02/2024"), Some(ymd(2024, 2, 1)));
        assert_eq!(parse_date("15/01/2024"), Some(ymd(2024, 1, 15)));
    }

    #[test]
    fn test_parse_date_two_digit_year() {
        assert_eq!(parse_date("01/02/24"), Some(ymd(2024, 2, 1)));
        assert_eq!(parse_date("15-01-24"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_date("0024-02-01"), None);
        assert_eq!(parse_date("01/02/20245"), None);
    }

    #[test]
    fn test_normalize_two_digit_year_sorts_with_its_peers() {
        let rows = vec![
            RawRow::new("01/01/24", "ana", "90"),
            RawRow::new("2024-01-08", "ana", "88"),
            RawRow::new("2024-01-15", "ana", "85"),
        ];
        let out = normalize(&rows);
        let dates: Vec<NaiveDate> = out.table.iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![ymd(2024, 1, 1), ymd(2024, 1, 8), ymd(2024, 1, 15)]
        );
        assert!(out.rejected.is_empty());
    }

    #[test]
    fn test_parse_date_with_time_is_truncated() {
        assert_eq!(parse_date("2024-01-05 7:30"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_date("2024-01-05 17:30:12"), Some(ymd(2024, 1, 5)));
        assert_eq!(parse_date("2024-01-05T08:00:00"), Some(ymd(2024, 1, 5)));
    }

    #[test]
    fn test_parse_date_invalid() {
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("2024-01-05 lunch"), None);
    }

    #[test]
    fn test_normalize_mixed_formats() {
        let rows = vec![
            RawRow::new("2024-01-01", "ana", "80,5"),
            RawRow::new("01/02/2024", "ana", "79.0"),
            RawRow::new("garbage", "ana", "50"),
        ];
        let out = normalize(&rows);

        assert_eq!(out.table.len(), 2);
        assert_eq!(out.table[0].date, ymd(2024, 1, 1));
        assert!((out.table[0].weight_kg - 80.5).abs() < f64::EPSILON);
        assert_eq!(out.table[1].date, ymd(2024, 2, 1));
        assert!((out.table[1].weight_kg - 79.0).abs() < f64::EPSILON);

        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].source_row, 2);
        assert_eq!(out.rejected[0].reason, RejectReason::BadDate);
    }

    #[test]
    fn test_normalize_each_bad_row_drops_one() {
        let good = vec![
            RawRow::new("2024-01-01", "ana", "80"),
            RawRow::new("2024-01-02", "ana", "79"),
        ];
        let mut with_bad = good.clone();
        with_bad.push(RawRow::new("not-a-date", "ana", "78"));
        with_bad.push(RawRow::new("2024-01-03", "ana", "heavy"));

        assert_eq!(normalize(&good).table.len(), 2);
        let out = normalize(&with_bad);
        assert_eq!(out.table.len(), 2);
        assert_eq!(out.rejected.len(), 2);
        assert_eq!(out.rejected[1].reason, RejectReason::BadWeight);
    }

    #[test]
    fn test_normalize_rejects_blank_user() {
        let out = normalize(&[RawRow::new("2024-01-01", "  ", "80")]);
        assert!(out.table.is_empty());
        assert_eq!(out.rejected[0].reason, RejectReason::MissingUser);
    }

    #[test]
    fn test_normalize_sorts_by_date_then_user() {
        let rows = vec![
            RawRow::new("2024-01-03", "bea", "70"),
            RawRow::new("2024-01-01", "carl", "90"),
            RawRow::new("2024-01-01", "ana", "80"),
        ];
        let out = normalize(&rows);
        let order: Vec<(&str, usize)> = out
            .table
            .iter()
            .map(|r| (r.user.as_str(), r.source_row))
            .collect();
        assert_eq!(order, vec![("ana", 2), ("carl", 1), ("bea", 0)]);
    }

    #[test]
    fn test_normalize_keeps_same_day_duplicates_in_sheet_order() {
        let rows = vec![
            RawRow::new("2024-01-01", "ana", "80"),
            RawRow::new("2024-01-01", "ana", "79.5"),
        ];
        let out = normalize(&rows);
        assert_eq!(out.table.len(), 2);
        assert_eq!(out.table[0].source_row, 0);
        assert_eq!(out.table[1].source_row, 1);
    }

    #[test]
    fn test_normalize_is_idempotent_on_clean_input() {
        let rows = vec![
            RawRow::new("2024-01-01", "ana", "80.5"),
            RawRow::new("2024-01-01", "bea", "65"),
            RawRow::new("2024-01-08", "ana", "79.25"),
        ];
        let first = normalize(&rows);
        let rewritten: Vec<RawRow> = first
            .table
            .iter()
            .map(|r| {
                RawRow::new(
                    r.date.format("%Y-%m-%d").to_string(),
                    r.user.clone(),
                    r.weight_kg.to_string(),
                )
            })
            .collect();
        let second = normalize(&rewritten);

        assert_eq!(first.table, second.table);
        assert!(second.rejected.is_empty());
    }

    #[test]
    fn test_normalize_empty() {
        let out = normalize(&[]);
        assert!(out.table.is_empty());
        assert!(out.rejected.is_empty());
    }
}
