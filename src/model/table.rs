use std::io;
use std::sync::Arc;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use thiserror::Error;

use super::side::{ColumnKey, RawField, Side};

/// Nullable numeric column. Shared immutably between table versions.
pub type Column = Arc<[Option<f64>]>;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("column `{column}` has {actual} rows but the table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("timestamps must be strictly increasing: row {index} ({timestamp}) does not follow its predecessor")]
    Unordered {
        index: usize,
        timestamp: NaiveDateTime,
    },
}

/// Time-ordered option-chain snapshots for one logical series.
///
/// Tables are append-only: pipeline stages never modify an existing column,
/// they return a new version carrying the additional columns. Cloning a table
/// only clones column handles.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotTable {
    timestamps: Arc<[NaiveDateTime]>,
    strike: Option<f64>,
    columns: IndexMap<ColumnKey, Column>,
}

impl SnapshotTable {
    /// Create an empty-column table over `timestamps`, which must be strictly increasing.
    pub fn new(timestamps: Vec<NaiveDateTime>) -> Result<Self, TableError> {
        for (index, pair) in timestamps.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(TableError::Unordered {
                    index: index + 1,
                    timestamp: pair[1],
                });
            }
        }
        Ok(Self {
            timestamps: timestamps.into(),
            strike: None,
            columns: IndexMap::new(),
        })
    }

    /// Tag the table with the strike it was built for.
    pub fn with_strike(mut self, strike: Option<f64>) -> Self {
        self.strike = strike;
        self
    }

    /// Builder helper for raw input columns.
    pub fn with_raw(
        self,
        side: Side,
        field: RawField,
        values: Vec<Option<f64>>,
    ) -> Result<Self, TableError> {
        self.with_column(ColumnKey::Raw(side, field), values)
    }

    /// Return a new version with `key` appended. If the table already has a
    /// column under `key` the existing column is kept and `values` is dropped.
    pub fn with_column(&self, key: ColumnKey, values: Vec<Option<f64>>) -> Result<Self, TableError> {
        self.with_columns([(key, values)])
    }

    /// Append several columns at once; same keep-existing rule as [`Self::with_column`].
    pub fn with_columns(
        &self,
        columns: impl IntoIterator<Item = (ColumnKey, Vec<Option<f64>>)>,
    ) -> Result<Self, TableError> {
        let mut next = self.clone();
        for (key, values) in columns {
            if next.columns.contains_key(&key) {
                tracing::trace!(column = %key, "column already present, keeping existing values");
                continue;
            }
            if values.len() != next.len() {
                return Err(TableError::LengthMismatch {
                    column: key.name(),
                    expected: next.len(),
                    actual: values.len(),
                });
            }
            next.columns.insert(key, values.into());
        }
        Ok(next)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn strike(&self) -> Option<f64> {
        self.strike
    }

    pub fn has(&self, key: &ColumnKey) -> bool {
        self.columns.contains_key(key)
    }

    pub fn column(&self, key: &ColumnKey) -> Option<&[Option<f64>]> {
        self.columns.get(key).map(|c| &c[..])
    }

    pub fn raw(&self, side: Side, field: RawField) -> Option<&[Option<f64>]> {
        self.column(&ColumnKey::Raw(side, field))
    }

    /// Column keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &ColumnKey> {
        self.columns.keys()
    }

    /// Last non-null value of a column.
    pub fn last_valid(&self, key: &ColumnKey) -> Option<f64> {
        self.column(key).and_then(last_valid)
    }

    /// Write every row with all columns, full precision, nulls as empty cells.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec!["timestamp".to_string()];
        header.extend(self.columns.keys().map(ColumnKey::name));
        wtr.write_record(&header)?;

        for (row, ts) in self.timestamps.iter().enumerate() {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(ts.format("%Y-%m-%d %H:%M:%S").to_string());
            for column in self.columns.values() {
                record.push(column[row].map(|v| v.to_string()).unwrap_or_default());
            }
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Last non-null value in a nullable series.
pub fn last_valid(values: &[Option<f64>]) -> Option<f64> {
    values.iter().rev().find_map(|v| *v)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_rejects_unordered_timestamps() {
        let err = SnapshotTable::new(vec![ts(15), ts(20), ts(20)]).unwrap_err();
        assert!(matches!(err, TableError::Unordered { index: 2, .. }));

        assert!(SnapshotTable::new(vec![ts(20), ts(15)]).is_err());
    }

    #[test]
    fn test_append_keeps_existing_column() {
        let table = SnapshotTable::new(vec![ts(15), ts(20)])
            .unwrap()
            .with_raw(Side::Call, RawField::LastPrice, vec![Some(1.0), Some(2.0)])
            .unwrap();

        let again = table
            .with_raw(Side::Call, RawField::LastPrice, vec![Some(9.0), Some(9.0)])
            .unwrap();
        assert_eq!(
            again.raw(Side::Call, RawField::LastPrice).unwrap(),
            &[Some(1.0), Some(2.0)]
        );
        assert_eq!(again.keys().count(), 1);
    }

    #[test]
    fn test_versions_do_not_alias() {
        let base = SnapshotTable::new(vec![ts(15), ts(20)]).unwrap();
        let next = base
            .with_column(ColumnKey::Strength, vec![None, Some(0.5)])
            .unwrap();
        assert!(!base.has(&ColumnKey::Strength));
        assert_eq!(next.last_valid(&ColumnKey::Strength), Some(0.5));
    }

    #[test]
    fn test_length_mismatch() {
        let base = SnapshotTable::new(vec![ts(15), ts(20)]).unwrap();
        let err = base
            .with_column(ColumnKey::OiImbalance, vec![Some(0.1)])
            .unwrap_err();
        assert!(matches!(err, TableError::LengthMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_write_csv() {
        let table = SnapshotTable::new(vec![ts(15), ts(20)])
            .unwrap()
            .with_raw(Side::Put, RawField::OpenInterest, vec![None, Some(800.0)])
            .unwrap();
        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "timestamp,PE_openInterest\n2024-01-15 09:15:00,\n2024-01-15 09:20:00,800\n"
        );
    }
}
