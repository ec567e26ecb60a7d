use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::info;

use crate::auth::Session;
use crate::models::{
    ImportSummary, Leaderboard, Normalized, RawRow, SeriesPoint, WeightRecord, validate_weight,
};
use crate::normalize::normalize;
use crate::stats::{compute_leaderboard, series_by_user};
use crate::store::TableStore;

/// The group board on top of a shared sheet.
///
/// Holds no state besides the store: every call reads the whole sheet again
/// and normalizes it from scratch.
pub struct Board<S: TableStore> {
    store: S,
}

impl<S: TableStore> Board<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn read_raw(&self) -> Result<Vec<RawRow>> {
        self.store
            .read_all()
            .context("Could not read the weigh-in sheet")
    }

    fn write_raw(&self, rows: &[RawRow]) -> Result<()> {
        self.store
            .replace_all(rows)
            .context("Could not write the weigh-in sheet")
    }

    /// Current sheet, cleaned. Rejected rows come along for diagnostics.
    pub fn snapshot(&self) -> Result<Normalized> {
        Ok(normalize(&self.read_raw()?))
    }

    pub fn leaderboard(&self) -> Result<Leaderboard> {
        Ok(compute_leaderboard(&self.snapshot()?.table))
    }

    pub fn series(&self) -> Result<BTreeMap<String, Vec<SeriesPoint>>> {
        Ok(series_by_user(&self.snapshot()?.table))
    }

    /// Append a weigh-in for the logged-in user.
    pub fn register_weight(
        &self,
        session: &Session,
        date: NaiveDate,
        weight_kg: f64,
    ) -> Result<WeightRecord> {
        let weight_kg = validate_weight(weight_kg)?;

        let mut rows = self.read_raw()?;
        let source_row = rows.len();
        rows.push(RawRow::new(
            date.format("%Y-%m-%d").to_string(),
            session.user(),
            weight_kg.to_string(),
        ));
        self.write_raw(&rows)?;

        info!(user = session.user(), %date, weight_kg, "weigh-in registered");
        Ok(WeightRecord {
            date,
            user: session.user().to_string(),
            weight_kg,
            source_row,
        })
    }

    /// Remove the logged-in user's most recent weigh-in.
    ///
    /// "Most recent" is the user's last record in table order, so of two
    /// weigh-ins on the same day the one further down the sheet goes. Returns
    /// `None` if the user has no readable records.
    pub fn delete_latest(&self, session: &Session) -> Result<Option<WeightRecord>> {
        let mut rows = self.read_raw()?;
        let normalized = normalize(&rows);

        let Some(latest) = normalized
            .table
            .into_iter()
            .rev()
            .find(|r| session.owns(&r.user))
        else {
            return Ok(None);
        };

        rows.remove(latest.source_row);
        self.write_raw(&rows)?;

        info!(user = session.user(), date = %latest.date, "weigh-in deleted");
        Ok(Some(latest))
    }

    /// Append rows from another sheet as they are.
    ///
    /// Nothing is cleaned on the way in; the summary reports how the incoming
    /// rows would fare in the normalizer. With `dry_run` the sheet is left
    /// untouched.
    pub fn import_rows(&self, incoming: Vec<RawRow>, dry_run: bool) -> Result<ImportSummary> {
        let preview = normalize(&incoming);
        let users_seen = preview
            .table
            .iter()
            .map(|r| r.user.as_str())
            .collect::<HashSet<_>>()
            .len();

        let summary = ImportSummary {
            rows_read: incoming.len(),
            rows_accepted: preview.table.len(),
            rows_rejected: preview.rejected.len(),
            users_seen,
            dry_run,
        };

        if !dry_run && !incoming.is_empty() {
            let mut rows = self.read_raw()?;
            rows.extend(incoming);
            self.write_raw(&rows)?;
            info!(rows = summary.rows_read, "rows imported");
        }

        Ok(summary)
    }
}
