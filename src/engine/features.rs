//! Per-row features: first differences, percent returns and the call/put
//! open-interest imbalance.

use crate::error::Diagnostic;
use crate::model::{ColumnKey, DerivedField, RawField, Side, SnapshotTable, TableError};

/// Append the five derived columns for every side in `sides`, plus the OI
/// imbalance column. A side lacking one of its raw inputs is skipped and
/// reported. Columns that already exist are left untouched, so deriving an
/// already-derived table returns an equal table.
pub fn derive_features(
    table: &SnapshotTable,
    sides: &[Side],
) -> Result<(SnapshotTable, Vec<Diagnostic>), TableError> {
    let mut diagnostics = Vec::new();
    let mut columns = Vec::new();

    for &side in sides {
        if let Some(field) = RawField::FEATURE_INPUTS
            .into_iter()
            .find(|f| table.raw(side, *f).is_none())
        {
            tracing::debug!(%side, column = %field.column(side), "skipping side, raw column absent");
            diagnostics.push(Diagnostic::MissingColumn {
                side,
                column: field.column(side),
            });
            continue;
        }

        for derived in DerivedField::ALL {
            let key = ColumnKey::Derived(side, derived);
            if table.has(&key) {
                continue;
            }
            let Some(raw) = table.raw(side, derived.source()) else {
                continue;
            };
            let values = match derived {
                DerivedField::ReturnPct => percent_change(raw),
                _ => first_difference(raw),
            };
            columns.push((key, values));
        }
    }

    if !table.has(&ColumnKey::OiImbalance) {
        if let (Some(ce), Some(pe)) = (
            table.raw(Side::Call, RawField::OpenInterest),
            table.raw(Side::Put, RawField::OpenInterest),
        ) {
            let values = ce
                .iter()
                .zip(pe)
                .map(|(c, p)| oi_imbalance((*c)?, (*p)?))
                .collect();
            columns.push((ColumnKey::OiImbalance, values));
        }
    }

    Ok((table.with_columns(columns)?, diagnostics))
}

/// Whether all derived columns of `side` are present.
pub fn has_features(table: &SnapshotTable, side: Side) -> bool {
    DerivedField::ALL
        .iter()
        .all(|f| table.has(&ColumnKey::Derived(side, *f)))
}

/// `x[i] - x[i-1]`; row 0 and rows touching a null are null.
pub fn first_difference(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(values.windows(2).map(|w| Some(w[1]? - w[0]?)));
    out
}

/// `(x[i] - x[i-1]) / x[i-1] * 100`; null when the previous value is 0 or null.
pub fn percent_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(values.windows(2).map(|w| {
        let (prev, cur) = (w[0]?, w[1]?);
        (prev != 0.0).then(|| (cur - prev) / prev * 100.0)
    }));
    out
}

/// `(CE_OI - PE_OI) / (CE_OI + PE_OI)`; null when both sides are zero.
pub fn oi_imbalance(ce_oi: f64, pe_oi: f64) -> Option<f64> {
    let total = ce_oi + pe_oi;
    (total != 0.0).then(|| (ce_oi - pe_oi) / total)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;

    fn timestamps(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::minutes(5 * i as i64))
            .collect()
    }

    fn side_table(sides: &[Side]) -> SnapshotTable {
        let mut table = SnapshotTable::new(timestamps(3)).unwrap();
        for &side in sides {
            table = table
                .with_raw(side, RawField::LastPrice, vec![Some(100.0), Some(110.0), Some(99.0)])
                .unwrap()
                .with_raw(side, RawField::OpenInterest, vec![Some(1200.0), Some(1250.0), None])
                .unwrap()
                .with_raw(side, RawField::TotalTradedVolume, vec![Some(10.0), Some(30.0), Some(60.0)])
                .unwrap()
                .with_raw(side, RawField::ImpliedVolatility, vec![Some(14.0), Some(14.5), Some(14.25)])
                .unwrap();
        }
        table
    }

    #[test]
    fn test_first_difference_and_returns() {
        let prices = [Some(100.0), Some(110.0), None, Some(120.0)];
        assert_eq!(first_difference(&prices), vec![None, Some(10.0), None, None]);
        assert_eq!(percent_change(&[Some(0.0), Some(5.0)]), vec![None, None]);

        let ret = percent_change(&[Some(100.0), Some(110.0)]);
        assert!((ret[1].unwrap() - 10.0).abs() < 1e-12);
        assert!(first_difference(&[]).is_empty());
    }

    #[test]
    fn test_oi_imbalance_exact() {
        assert_eq!(oi_imbalance(1200.0, 800.0), Some(0.2));
        assert_eq!(oi_imbalance(0.0, 0.0), None);
        assert_eq!(oi_imbalance(0.0, 500.0), Some(-1.0));
    }

    #[test]
    fn test_derives_both_sides() {
        let (table, diagnostics) = derive_features(&side_table(&Side::ALL), &Side::ALL).unwrap();
        assert!(diagnostics.is_empty());
        assert!(has_features(&table, Side::Call));
        assert!(has_features(&table, Side::Put));

        let d_oi = table
            .column(&ColumnKey::Derived(Side::Call, DerivedField::OiDelta))
            .unwrap();
        assert_eq!(d_oi, &[None, Some(50.0), None]);
        let d_vol = table
            .column(&ColumnKey::Derived(Side::Put, DerivedField::VolumeDelta))
            .unwrap();
        assert_eq!(d_vol, &[None, Some(20.0), Some(30.0)]);
        assert_eq!(
            table.column(&ColumnKey::OiImbalance).unwrap(),
            &[Some(0.0), Some(0.0), None]
        );
    }

    #[test]
    fn test_missing_side_is_skipped() {
        let (table, diagnostics) = derive_features(&side_table(&[Side::Call]), &Side::ALL).unwrap();
        assert!(has_features(&table, Side::Call));
        assert!(!has_features(&table, Side::Put));
        assert!(!table.has(&ColumnKey::OiImbalance));
        assert_eq!(
            diagnostics,
            vec![Diagnostic::MissingColumn {
                side: Side::Put,
                column: "PE_lastPrice".into()
            }]
        );
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let raw = side_table(&Side::ALL);
        let (once, _) = derive_features(&raw, &Side::ALL).unwrap();
        let (twice, _) = derive_features(&once, &Side::ALL).unwrap();
        assert_eq!(once, twice);

        let (mut a, mut b) = (Vec::new(), Vec::new());
        once.write_csv(&mut a).unwrap();
        twice.write_csv(&mut b).unwrap();
        assert_eq!(a, b);
    }
}
