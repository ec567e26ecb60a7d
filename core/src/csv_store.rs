use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use csv::ByteRecord;
use tracing::debug;

use crate::models::RawRow;
use crate::store::TableStore;

/// Header written to every sheet export.
pub const SHEET_HEADER: [&str; 3] = ["Fecha", "Usuario", "Peso"];

const DATE_NAMES: &[&str] = &["Fecha", "Date"];
const USER_NAMES: &[&str] = &["Usuario", "User"];
const WEIGHT_NAMES: &[&str] = &["Peso", "Weight"];

fn find_column(headers: &ByteRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = String::from_utf8_lossy(h);
        names.iter().any(|n| h.eq_ignore_ascii_case(n))
    })
}

/// Required columns a header row does not name. An empty header names nothing
/// and needs nothing.
fn missing_columns(headers: &ByteRecord) -> Vec<&'static str> {
    if headers.iter().all(<[u8]>::is_empty) {
        return Vec::new();
    }
    [DATE_NAMES, USER_NAMES, WEIGHT_NAMES]
        .into_iter()
        .filter(|names| find_column(headers, names).is_none())
        .map(|names| names[0])
        .collect()
}

/// Read a sheet export from any reader.
///
/// Expected header: `Fecha,Usuario,Peso` (case-insensitive; `Date`, `User`,
/// `Weight` also match). A missing column reads as empty cells, short rows are
/// padded, and invalid UTF-8 is replaced rather than rejected, so the
/// normalizer gets to decide what survives. Fully blank lines are skipped.
/// Cells under any other header are kept in [`RawRow::extra`].
pub fn parse_store_csv<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .byte_headers()
        .context("Failed to read CSV headers")?
        .clone();

    let idx_date = find_column(&headers, DATE_NAMES);
    let idx_user = find_column(&headers, USER_NAMES);
    let idx_weight = find_column(&headers, WEIGHT_NAMES);
    let known = [idx_date, idx_user, idx_weight];
    let extra_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !known.contains(&Some(*i)))
        .map(|(i, h)| (i, String::from_utf8_lossy(h).into_owned()))
        .collect();

    let mut rows = Vec::new();
    for (line_num, result) in rdr.byte_records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;
        if record.iter().all(<[u8]>::is_empty) {
            continue;
        }

        let cell = |idx: Option<usize>| -> String {
            idx.and_then(|i| record.get(i))
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .unwrap_or_default()
        };

        rows.push(RawRow {
            date: cell(idx_date),
            user: cell(idx_user),
            weight: cell(idx_weight),
            extra: extra_columns
                .iter()
                .map(|(i, name)| (name.clone(), cell(Some(*i))))
                .collect(),
        });
    }

    Ok(rows)
}

/// Write rows as a sheet export, header first.
///
/// Extra columns follow `Peso` in the order they first appear; rows without a
/// value for one get an empty cell.
pub fn write_store_csv<W: Write>(writer: W, rows: &[RawRow]) -> Result<()> {
    let mut extra_names: Vec<&str> = Vec::new();
    for (name, _) in rows.iter().flat_map(|row| &row.extra) {
        if !extra_names.contains(&name.as_str()) {
            extra_names.push(name);
        }
    }

    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(SHEET_HEADER.iter().chain(&extra_names))?;
    for row in rows {
        let extras = extra_names.iter().map(|name| {
            row.extra
                .iter()
                .find(|(n, _)| n == name)
                .map_or("", |(_, v)| v.as_str())
        });
        wtr.write_record(
            [row.date.as_str(), row.user.as_str(), row.weight.as_str()]
                .into_iter()
                .chain(extras),
        )?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// A sheet kept as a CSV file on disk.
///
/// A missing file reads as an empty sheet. Writes go to a sibling temp file
/// that is renamed over the original, and are refused when the existing file's
/// header lacks a `Fecha`, `Usuario` or `Peso` column.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn check_header(&self) -> Result<()> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to open sheet: {}", self.path.display())
                });
            }
        };
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        let headers = rdr
            .byte_headers()
            .with_context(|| format!("Failed to read sheet header: {}", self.path.display()))?;

        let missing = missing_columns(headers);
        if !missing.is_empty() {
            bail!(
                "Sheet {} has no {} column; rename the header before writing to it",
                self.path.display(),
                missing.join(", ")
            );
        }
        Ok(())
    }
}

impl TableStore for CsvStore {
    fn read_all(&self) -> Result<Vec<RawRow>> {
        let file = match std::fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "sheet file missing, reading as empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to open sheet: {}", self.path.display())
                });
            }
        };
        parse_store_csv(file).with_context(|| format!("Failed to read sheet: {}", self.path.display()))
    }

    fn replace_all(&self, rows: &[RawRow]) -> Result<()> {
        self.check_header()?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let file = std::fs::File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        write_store_csv(file, rows)?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace sheet: {}", self.path.display()))?;
        debug!(path = %self.path.display(), rows = rows.len(), "sheet replaced");
        Ok(())
    }
}
