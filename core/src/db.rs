use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::models::RawRow;
use crate::store::TableStore;

/// The sheet kept in a local SQLite file, one row per sheet line.
///
/// Cells are stored as text exactly as written so that the normalizer sees the
/// same input it would get from any other sheet.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS sheet_rows (
                    position INTEGER PRIMARY KEY,
                    fecha TEXT NOT NULL DEFAULT '',
                    usuario TEXT NOT NULL DEFAULT '',
                    peso TEXT NOT NULL DEFAULT ''
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    fn raw_row_from_row(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
        Ok(RawRow {
            date: row.get(0)?,
            user: row.get(1)?,
            weight: row.get(2)?,
            extra: Vec::new(),
        })
    }
}

impl TableStore for Database {
    fn read_all(&self) -> Result<Vec<RawRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT fecha, usuario, peso FROM sheet_rows ORDER BY position")?;
        let rows = stmt
            .query_map([], Self::raw_row_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn replace_all(&self, rows: &[RawRow]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM sheet_rows", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sheet_rows (position, fecha, usuario, peso) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, row) in rows.iter().enumerate() {
                let position = i64::try_from(position).context("Sheet too large")?;
                stmt.execute(params![position, row.date, row.user, row.weight])?;
            }
        }
        tx.commit().context("Failed to replace sheet rows")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<RawRow> {
        vec![
            RawRow::new("2024-01-01", "ana", "80,5"),
            RawRow::new("01/02/2024", "ana", "79.0"),
            RawRow::new("garbage", "juan", ""),
        ]
    }

    #[test]
    fn test_empty_database_reads_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_replace_all_keeps_order_and_text() {
        let db = Database::open_in_memory().unwrap();
        db.replace_all(&sample_rows()).unwrap();

        let rows = db.read_all().unwrap();
        assert_eq!(rows, sample_rows());
    }

    #[test]
    fn test_replace_all_overwrites() {
        let db = Database::open_in_memory().unwrap();
        db.replace_all(&sample_rows()).unwrap();
        db.replace_all(&[RawRow::new("2024-03-01", "bea", "60")])
            .unwrap();

        let rows = db.read_all().unwrap();
        assert_eq!(rows, vec![RawRow::new("2024-03-01", "bea", "60")]);
    }

    #[test]
    fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.db");
        {
            let db = Database::open(&path).unwrap();
            db.replace_all(&sample_rows()).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.read_all().unwrap().len(), 3);
    }

    #[test]
    fn test_migration_sets_user_version() {
        let db = Database::open_in_memory().unwrap();
        let version: i64 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }
}
