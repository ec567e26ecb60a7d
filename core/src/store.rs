use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;

use crate::csv_store::CsvStore;
use crate::db::Database;
use crate::models::RawRow;

/// The shared sheet every weigh-in lives in.
///
/// It only supports reading everything and replacing everything, so appends
/// and deletes are read-modify-write cycles over the whole table. Nothing here
/// locks or versions the sheet: two writers that read the same snapshot will
/// race, and the last `replace_all` wins.
pub trait TableStore: Send {
    fn read_all(&self) -> Result<Vec<RawRow>>;

    /// Overwrite the sheet. Either every row is written or the call fails and
    /// the previous contents stay in place.
    fn replace_all(&self, rows: &[RawRow]) -> Result<()>;
}

impl TableStore for Box<dyn TableStore> {
    fn read_all(&self) -> Result<Vec<RawRow>> {
        (**self).read_all()
    }

    fn replace_all(&self, rows: &[RawRow]) -> Result<()> {
        (**self).replace_all(rows)
    }
}

/// In-process sheet, handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<RawRow>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }
}

impl TableStore for MemoryStore {
    fn read_all(&self) -> Result<Vec<RawRow>> {
        let rows = self
            .rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(rows.clone())
    }

    fn replace_all(&self, rows: &[RawRow]) -> Result<()> {
        let mut current = self
            .rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *current = rows.to_vec();
        Ok(())
    }
}

/// Open the sheet at `path`: a `.csv` export, or a SQLite file for anything else.
pub fn open_store(path: &Path) -> Result<Box<dyn TableStore>> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        Ok(Box::new(CsvStore::new(path)))
    } else {
        Ok(Box::new(Database::open(path)?))
    }
}
