use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use weighboard_core::auth::{Credentials, Session};

const KG_PER_LB: f64 = 0.453_592;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday")),
        },
    }
}

/// Convert an entered weight to kilograms.
pub(crate) fn to_kg(value: f64, unit: &str) -> Result<f64> {
    match unit.to_lowercase().as_str() {
        "kg" => Ok(value),
        "lbs" | "lb" => {
            let kg = no_neg_zero(value * KG_PER_LB);
            eprintln!("Converting {value:.1} lbs → {kg:.2} kg");
            Ok(kg)
        }
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    }
}

pub(crate) fn authenticate(credentials: &Credentials, user: &str, password: &str) -> Result<Session> {
    if credentials.is_empty() {
        bail!("No users configured. Add one with `weighboard user add <name> <secret>`");
    }
    credentials
        .login(user, password)
        .context("Invalid user or password")
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

/// Two-decimal display with an explicit sign, e.g. `+1.50` for a loss of 1.5 kg.
pub(crate) fn signed(v: f64) -> String {
    let v = no_neg_zero((v * 100.0).round() / 100.0);
    format!("{v:+.2}")
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_to_kg() {
        assert!((to_kg(80.0, "kg").unwrap() - 80.0).abs() < f64::EPSILON);
        assert!((to_kg(200.0, "LBS").unwrap() - 90.7184).abs() < 1e-6);
        assert!(to_kg(80.0, "stone").is_err());
    }

    #[test]
    fn test_authenticate() {
        let creds = Credentials::from_pairs([("ana", "secreto")]);
        assert_eq!(authenticate(&creds, "ANA", "secreto").unwrap().user(), "ana");
        assert!(authenticate(&creds, "ana", "nope").is_err());

        let err = authenticate(&Credentials::default(), "ana", "secreto").unwrap_err();
        assert!(err.to_string().contains("No users configured"));
    }

    #[test]
    fn test_signed() {
        assert_eq!(signed(1.5), "+1.50");
        assert_eq!(signed(-0.004), "+0.00");
        assert_eq!(signed(-2.346), "-2.35");
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("boom"), r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("María José", 20), "María José");
        assert_eq!(truncate("Maximiliano Fernández", 10), "Maximil...");
    }
}
