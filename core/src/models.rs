use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lowest weight accepted when registering a new weigh-in.
pub const MIN_WEIGHT_KG: f64 = 30.0;
/// Highest weight accepted when registering a new weigh-in.
pub const MAX_WEIGHT_KG: f64 = 200.0;

/// A single row as it sits in the shared sheet: three loosely-typed cells.
///
/// The sheet header is `Fecha,Usuario,Peso`. Rows written by older versions of
/// the tracker may carry any date or weight spelling, so nothing here is
/// validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Fecha", default)]
    pub date: String,
    #[serde(rename = "Usuario", default)]
    pub user: String,
    #[serde(rename = "Peso", default)]
    pub weight: String,
    /// Cells from any other sheet columns, as `(header, value)`. Kept so that
    /// rewriting a CSV sheet does not drop them; SQLite stores only the three
    /// cells above.
    #[serde(skip)]
    pub extra: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(date: impl Into<String>, user: impl Into<String>, weight: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            user: user.into(),
            weight: weight.into(),
            extra: Vec::new(),
        }
    }
}

/// A cleaned, typed weigh-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightRecord {
    pub date: NaiveDate,
    pub user: String,
    pub weight_kg: f64,
    /// Position of the raw row this record was read from.
    #[serde(skip)]
    pub source_row: usize,
}

/// Records sorted by date, then user, then sheet position.
pub type NormalizedTable = Vec<WeightRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    BadDate,
    BadWeight,
    MissingUser,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BadDate => "unparsable date",
            Self::BadWeight => "unparsable weight",
            Self::MissingUser => "missing user",
        };
        f.write_str(s)
    }
}

/// A raw row that did not make it into the normalized table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub source_row: usize,
    pub raw: RawRow,
    pub reason: RejectReason,
}

/// Output of one normalization pass: the clean table plus everything dropped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Normalized {
    pub table: NormalizedTable,
    pub rejected: Vec<RejectedRow>,
}

/// Per-user summary derived from the normalized table. Never stored.
///
/// Positive changes mean weight lost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub user: String,
    pub current_weight: f64,
    pub first_weight: f64,
    pub total_change: f64,
    pub last_interval_change: f64,
    pub percent_change: f64,
    pub entry_count: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Leaderboard {
    pub users: Vec<UserStats>,
    pub total_group_change: f64,
}

/// Ranking categories shown on the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    /// Change since the previous weigh-in ("weekly" on the board).
    #[serde(alias = "weekly")]
    LastInterval,
    #[serde(alias = "total")]
    TotalLost,
    #[serde(alias = "percent")]
    PercentLost,
}

impl RankBy {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "weekly" | "interval" | "last" | "last_interval" => Ok(Self::LastInterval),
            "total" | "total_lost" => Ok(Self::TotalLost),
            "percent" | "pct" | "percent_lost" => Ok(Self::PercentLost),
            _ => bail!("Invalid ranking '{s}'. Use weekly, total, or percent"),
        }
    }

    pub fn key(self, stats: &UserStats) -> f64 {
        match self {
            Self::LastInterval => stats.last_interval_change,
            Self::TotalLost => stats.total_change,
            Self::PercentLost => stats.percent_change,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub weight_kg: f64,
}

/// Summary of what a sheet import would do / did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub rows_accepted: usize,
    pub rows_rejected: usize,
    pub users_seen: usize,
    pub dry_run: bool,
}

/// Validate a weight about to be registered: finite and within the plausible range.
pub fn validate_weight(weight_kg: f64) -> Result<f64> {
    if !weight_kg.is_finite() {
        bail!("Weight must be a number");
    }
    if !(MIN_WEIGHT_KG..=MAX_WEIGHT_KG).contains(&weight_kg) {
        bail!("Weight must be between {MIN_WEIGHT_KG} and {MAX_WEIGHT_KG} kg, got {weight_kg}");
    }
    Ok(weight_kg)
}
