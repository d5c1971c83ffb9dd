//! Fixed-window rolling correlations, regime classification and regime flips.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::stats;
use crate::error::Diagnostic;
use crate::model::{
    AnalysisConfig, ColumnKey, CorrPair, CorrelationBasis, DerivedField, RawField, Side,
    SnapshotTable, TableError,
};

/// Directional classification from the sign of a rolling correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    Bullish,
    Bearish,
}

impl Regime {
    /// Strictly positive correlation is bullish; zero and below are bearish.
    pub fn from_correlation(r: f64) -> Self {
        if r > 0.0 {
            Regime::Bullish
        } else {
            Regime::Bearish
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Bullish => f.pad("Bullish"),
            Regime::Bearish => f.pad("Bearish"),
        }
    }
}

/// A row where the regime of a rolling correlation changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlipEvent {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub from: Regime,
    pub to: Regime,
}

/// Rolling Pearson correlation over rows `[i - window + 1, i]`.
///
/// Output is aligned with the inputs. A row is null before the window fills,
/// when the window holds a null, or when either windowed series is constant.
pub fn rolling_correlation(
    x: &[Option<f64>],
    y: &[Option<f64>],
    window: usize,
) -> Vec<Option<f64>> {
    let n = x.len().min(y.len());
    let mut out = vec![None; n];
    if window == 0 || window > n {
        return out;
    }

    let mut xs = Vec::with_capacity(window);
    let mut ys = Vec::with_capacity(window);
    for end in window - 1..n {
        let start = end + 1 - window;
        xs.clear();
        ys.clear();
        let complete = (start..=end).all(|i| match (x[i], y[i]) {
            (Some(a), Some(b)) => {
                xs.push(a);
                ys.push(b);
                true
            }
            _ => false,
        });
        if complete {
            out[end] = stats::pearson(&xs, &ys);
        }
    }
    out
}

/// Regime from the most recent non-null value; `None` if the series has none.
pub fn regime(series: &[Option<f64>]) -> Option<Regime> {
    series
        .iter()
        .rev()
        .find_map(|v| v.map(Regime::from_correlation))
}

/// Rows whose regime differs from the previous row's. A null on either row
/// has no defined sign and never counts as a flip.
pub fn sign_flips(series: &[Option<f64>], timestamps: &[NaiveDateTime]) -> Vec<FlipEvent> {
    series
        .windows(2)
        .zip(timestamps.iter().skip(1))
        .enumerate()
        .filter_map(|(i, (pair, ts))| {
            let from = Regime::from_correlation(pair[0]?);
            let to = Regime::from_correlation(pair[1]?);
            (from != to).then_some(FlipEvent {
                index: i + 1,
                timestamp: *ts,
                from,
                to,
            })
        })
        .collect()
}

/// The two series correlated for `pair` on `side`, if the table has them.
pub fn correlation_inputs(
    table: &SnapshotTable,
    side: Side,
    pair: CorrPair,
    basis: CorrelationBasis,
) -> Option<(&[Option<f64>], &[Option<f64>])> {
    let (price, other) = match basis {
        CorrelationBasis::Deltas => {
            let other = match pair {
                CorrPair::PriceOi => DerivedField::OiDelta,
                CorrPair::PriceVolume => DerivedField::VolumeDelta,
            };
            (
                table.column(&ColumnKey::Derived(side, DerivedField::PriceDelta))?,
                table.column(&ColumnKey::Derived(side, other))?,
            )
        }
        CorrelationBasis::Levels => {
            let other = match pair {
                CorrPair::PriceOi => RawField::OpenInterest,
                CorrPair::PriceVolume => RawField::TotalTradedVolume,
            };
            (
                table.raw(side, RawField::LastPrice)?,
                table.raw(side, other)?,
            )
        }
    };
    Some((price, other))
}

/// Append rolling price/OI and price/volume correlations for each side that
/// has its inputs.
pub fn append_rolling(
    table: &SnapshotTable,
    config: &AnalysisConfig,
) -> Result<(SnapshotTable, Vec<Diagnostic>), TableError> {
    let mut diagnostics = Vec::new();
    let mut columns = Vec::new();

    for side in Side::ALL {
        for pair in CorrPair::ALL {
            let key = ColumnKey::RollingCorr { side, pair };
            if table.has(&key) {
                continue;
            }
            let Some((x, y)) = correlation_inputs(table, side, pair, config.basis) else {
                continue;
            };
            let series = rolling_correlation(x, y, config.window);

            if series.iter().all(Option::is_none) {
                let usable = x
                    .iter()
                    .zip(y)
                    .filter(|(a, b)| a.is_some() && b.is_some())
                    .count();
                diagnostics.push(if usable < config.window {
                    Diagnostic::InsufficientHistory {
                        metric: key.name(),
                        available: usable,
                        required: config.window,
                    }
                } else {
                    Diagnostic::DegenerateVariance { metric: key.name() }
                });
            }
            columns.push((key, series));
        }
    }

    Ok((table.with_columns(columns)?, diagnostics))
}
