pub mod parse;
pub mod strike;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::model::{RawField, Side, SnapshotTable, StrikeMode, TableError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("reading CSV {}: {source}", path.display())]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{}: missing required column `{column}`", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("{}: no `timestamp` column and no timestamp in the file name", path.display())]
    NoTimestamp { path: PathBuf },

    #[error("{} line {line}: invalid value `{value}` in column `{column}`", path.display())]
    InvalidValue {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },

    #[error("{} line {line}: unparseable timestamp `{value}`", path.display())]
    InvalidTimestamp {
        path: PathBuf,
        line: u64,
        value: String,
    },

    #[error("{}: no data rows", path.display())]
    Empty { path: PathBuf },

    #[error("`{source_id}` mixes strikes {strikes:?}; select one strike or aggregate")]
    MixedStrikes { source_id: String, strikes: Vec<i64> },

    #[error("`{source_id}` has no rows at strike {strike}")]
    StrikeNotFound { source_id: String, strike: i64 },

    #[error("`{source_id}`: {reason}")]
    Table {
        source_id: String,
        #[source]
        reason: TableError,
    },
}

/// One parsed CSV row: the five raw fields of both sides at one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub timestamp: NaiveDateTime,
    values: [[Option<f64>; 5]; 2],
}

impl RawRow {
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            values: [[None; 5]; 2],
        }
    }

    pub fn get(&self, side: Side, field: RawField) -> Option<f64> {
        self.values[side.index()][field.index()]
    }

    pub fn set(&mut self, side: Side, field: RawField, value: Option<f64>) {
        self.values[side.index()][field.index()] = value;
    }

    /// Integer-valued strike of the row, taken from the call side when present.
    pub fn strike(&self) -> Option<f64> {
        self.get(Side::Call, RawField::StrikePrice)
            .or_else(|| self.get(Side::Put, RawField::StrikePrice))
            .map(f64::round)
    }
}

/// All rows of one CSV file, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub path: PathBuf,
    pub rows: Vec<RawRow>,
}

/// A unit of analysis: one or more CSV files forming one series.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub id: String,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

/// Snapshot loader with a cache of parsed files.
///
/// A cached frame is reused while the file's size and modification time are
/// unchanged.
#[derive(Debug, Default)]
pub struct SnapshotLoader {
    cache: HashMap<PathBuf, (Fingerprint, Arc<RawFrame>)>,
}

impl SnapshotLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently cached.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Parse a snapshot CSV, or return the cached frame.
    pub fn load(&mut self, path: &Path) -> Result<Arc<RawFrame>, LoadError> {
        let meta = std::fs::metadata(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let fingerprint = Fingerprint {
            len: meta.len(),
            modified: meta.modified().ok(),
        };

        if let Some((cached, frame)) = self.cache.get(path) {
            if *cached == fingerprint {
                tracing::debug!(path = %path.display(), "using cached frame");
                return Ok(Arc::clone(frame));
            }
        }

        let frame = Arc::new(read_frame(path)?);
        tracing::debug!(path = %path.display(), rows = frame.rows.len(), "parsed snapshot file");
        self.cache
            .insert(path.to_path_buf(), (fingerprint, Arc::clone(&frame)));
        Ok(frame)
    }

    /// Load every file of `source` and assemble one time-ordered table.
    pub fn build_table(
        &mut self,
        source: &Source,
        strike: StrikeMode,
    ) -> Result<SnapshotTable, LoadError> {
        let frames = source
            .files
            .iter()
            .map(|f| self.load(f))
            .collect::<Result<Vec<_>, _>>()?;
        assemble_table(&source.id, &frames, strike)
    }
}

#[derive(Clone, Copy)]
enum Stamp {
    Column(usize),
    FileName(NaiveDateTime),
}

/// Read a snapshot CSV. All ten raw columns are required; the timestamp comes
/// from a `timestamp` column or, failing that, from the file name.
pub fn read_frame(path: &Path) -> Result<RawFrame, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let stamp = match headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("timestamp"))
    {
        Some(col) => Stamp::Column(col),
        None => {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            Stamp::FileName(parse::timestamp_from_file_name(stem).ok_or_else(|| {
                LoadError::NoTimestamp {
                    path: path.to_path_buf(),
                }
            })?)
        }
    };

    let mut columns = Vec::with_capacity(Side::ALL.len() * RawField::ALL.len());
    for side in Side::ALL {
        for field in RawField::ALL {
            let name = field.column(side);
            let pos = headers
                .iter()
                .position(|h| *h == name)
                .ok_or_else(|| LoadError::MissingColumn {
                    path: path.to_path_buf(),
                    column: name.clone(),
                })?;
            columns.push((side, field, pos, name));
        }
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let timestamp = match stamp {
            Stamp::Column(col) => {
                let cell = record.get(col).unwrap_or_default();
                parse::parse_timestamp(cell).ok_or_else(|| LoadError::InvalidTimestamp {
                    path: path.to_path_buf(),
                    line,
                    value: cell.to_string(),
                })?
            }
            Stamp::FileName(ts) => ts,
        };

        let mut row = RawRow::new(timestamp);
        for (side, field, pos, name) in &columns {
            let cell = record.get(*pos).unwrap_or_default();
            let value = parse::parse_number(cell).map_err(|()| LoadError::InvalidValue {
                path: path.to_path_buf(),
                line,
                column: name.clone(),
                value: cell.to_string(),
            })?;
            row.set(*side, *field, value);
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    Ok(RawFrame {
        path: path.to_path_buf(),
        rows,
    })
}

/// Concatenate frames into one table: apply the strike policy, order by
/// timestamp, and keep the last row of any repeated timestamp.
pub fn assemble_table(
    source_id: &str,
    frames: &[Arc<RawFrame>],
    strike: StrikeMode,
) -> Result<SnapshotTable, LoadError> {
    let rows: Vec<RawRow> = frames.iter().flat_map(|f| f.rows.iter().cloned()).collect();
    let (mut rows, strike) = strike::apply(rows, strike, source_id)?;

    rows.sort_by_key(|r| r.timestamp);
    let before = rows.len();
    let mut deduped: Vec<RawRow> = Vec::with_capacity(rows.len());
    for row in rows {
        match deduped.last_mut() {
            Some(last) if last.timestamp == row.timestamp => *last = row,
            _ => deduped.push(row),
        }
    }
    if deduped.len() < before {
        tracing::warn!(
            source = source_id,
            dropped = before - deduped.len(),
            "duplicate timestamps, keeping the last row of each"
        );
    }

    let table_err = |reason| LoadError::Table {
        source_id: source_id.to_string(),
        reason,
    };
    let mut table = SnapshotTable::new(deduped.iter().map(|r| r.timestamp).collect())
        .map_err(table_err)?
        .with_strike(strike);
    for side in Side::ALL {
        for field in RawField::ALL {
            let values = deduped.iter().map(|r| r.get(side, field)).collect();
            table = table.with_raw(side, field, values).map_err(table_err)?;
        }
    }
    Ok(table)
}

/// Expand paths into CSV files. Directories contribute their `*.csv` entries
/// sorted by name; files are kept as given.
pub fn collect_csv_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();
    for path in paths {
        let io_err = |source| LoadError::Io {
            path: path.clone(),
            source,
        };
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(io_err)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    p.is_file()
                        && p.extension()
                            .and_then(|e| e.to_str())
                            .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
                })
                .collect();
            entries.sort();
            files.extend(entries);
        } else {
            std::fs::metadata(path).map_err(io_err)?;
            files.push(path.clone());
        }
    }
    Ok(files)
}

/// Group input paths into sources. Each file is its own source unless
/// `combine` is set, in which case everything forms one series.
pub fn plan_sources(paths: &[PathBuf], combine: bool) -> Result<Vec<Source>, LoadError> {
    let files = collect_csv_files(paths)?;

    if combine {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let id = match paths {
            [single] => display_name(single),
            _ => "combined".to_string(),
        };
        return Ok(vec![Source { id, files }]);
    }

    let mut seen = HashSet::new();
    Ok(files
        .into_iter()
        .map(|file| {
            let mut id = display_name(&file);
            if !seen.insert(id.clone()) {
                id = file.display().to_string();
                seen.insert(id.clone());
            }
            Source {
                id,
                files: vec![file],
            }
        })
        .collect())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const HEADER: &str = "CE_lastPrice,CE_openInterest,CE_totalTradedVolume,CE_impliedVolatility,CE_strikePrice,\
PE_lastPrice,PE_openInterest,PE_totalTradedVolume,PE_impliedVolatility,PE_strikePrice";

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_read_frame_with_timestamp_column() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "timestamp,{HEADER}\n\
             2024-01-15 09:20:00,101.5,1200,50,14.2,22000,88,800,40,15.1,22000\n\
             2024-01-15 09:15:00,100,1100,,14,22000,90,790,30,15,22000\n"
        );
        let path = write(dir.path(), "chain.csv", &body);

        let frame = read_frame(&path).unwrap();
        assert_eq!(frame.rows.len(), 2);
        assert_eq!(frame.rows[0].get(Side::Call, RawField::OpenInterest), Some(1200.0));
        assert_eq!(frame.rows[1].get(Side::Call, RawField::TotalTradedVolume), None);
        assert_eq!(frame.rows[0].strike(), Some(22000.0));
    }

    #[test]
    fn test_read_frame_uses_file_name_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!("{HEADER}\n100,1100,10,14,22000,90,790,30,15,22000\n");
        let path = write(dir.path(), "nifty_20240115_091500.csv", &body);

        let frame = read_frame(&path).unwrap();
        assert_eq!(frame.rows[0].timestamp.to_string(), "2024-01-15 09:15:00");

        let path = write(dir.path(), "nifty.csv", &body);
        assert!(matches!(read_frame(&path), Err(LoadError::NoTimestamp { .. })));
    }

    #[test]
    fn test_read_frame_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let header = HEADER.replace(",PE_impliedVolatility", "");
        let body = format!("timestamp,{header}\n2024-01-15 09:15:00,1,2,3,4,5,6,7,8,9\n");
        let path = write(dir.path(), "broken.csv", &body);

        match read_frame(&path) {
            Err(LoadError::MissingColumn { column, .. }) => {
                assert_eq!(column, "PE_impliedVolatility")
            }
            other => panic!("expected missing column, got {other:?}"),
        }
    }

    #[test]
    fn test_read_frame_invalid_value() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!("timestamp,{HEADER}\n2024-01-15 09:15:00,abc,1,1,1,1,1,1,1,1,1\n");
        let path = write(dir.path(), "bad.csv", &body);
        assert!(matches!(
            read_frame(&path),
            Err(LoadError::InvalidValue { line: 2, .. })
        ));
    }

    #[test]
    fn test_loader_cache_and_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(
            dir.path(),
            "oc_20240115_0920.csv",
            &format!("{HEADER}\n102,1300,60,14,22000,87,810,45,15,22000\n"),
        );
        let b = write(
            dir.path(),
            "oc_20240115_0915.csv",
            &format!("{HEADER}\n100,1200,50,14,22000,88,800,40,15,22000\n"),
        );

        let mut loader = SnapshotLoader::new();
        let source = Source {
            id: "series".into(),
            files: vec![a.clone(), b],
        };
        let table = loader.build_table(&source, StrikeMode::Single).unwrap();
        assert_eq!(loader.cached(), 2);
        assert_eq!(table.len(), 2);
        assert_eq!(table.strike(), Some(22000.0));
        assert_eq!(
            table.raw(Side::Call, RawField::LastPrice).unwrap(),
            &[Some(100.0), Some(102.0)]
        );

        let first = loader.load(&a).unwrap();
        let second = loader.load(&a).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_plan_sources() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.csv", "x");
        write(dir.path(), "a.csv", "x");
        write(dir.path(), "notes.txt", "x");

        let sources = plan_sources(&[dir.path().to_path_buf()], false).unwrap();
        let ids: Vec<&str> = sources.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a.csv", "b.csv"]);

        let combined = plan_sources(&[dir.path().to_path_buf()], true).unwrap();
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].files.len(), 2);
    }
}
