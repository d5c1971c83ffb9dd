//! Composite strength score and signal classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::rolling::Regime;
use crate::model::{
    AnalysisConfig, ColumnKey, CompositeBasis, CorrPair, Side, SnapshotTable, TableError,
    Thresholds, Weights,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    BuyCe,
    BuyPe,
    Neutral,
    /// Directional strength not confirmed by the regime (gated mode only).
    NeutralConflict,
}

impl Signal {
    pub fn label(self) -> &'static str {
        match self {
            Signal::BuyCe => "BUY_CE",
            Signal::BuyPe => "BUY_PE",
            Signal::Neutral => "NEUTRAL",
            Signal::NeutralConflict => "NEUTRAL_CONFLICT",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// The three composite inputs at one row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CompositeInputs {
    pub r_price_oi: Option<f64>,
    pub r_price_vol: Option<f64>,
    pub oi_imbalance: Option<f64>,
}

/// Weighted strength. Missing correlations contribute 0; with no imbalance
/// observed yet the score is undefined.
pub fn composite_strength(inputs: &CompositeInputs, weights: &Weights) -> Option<f64> {
    let imbalance = inputs.oi_imbalance?;
    let s = weights.price_oi * inputs.r_price_oi.unwrap_or(0.0)
        + weights.price_vol * inputs.r_price_vol.unwrap_or(0.0)
        + weights.imbalance * imbalance;
    s.is_finite().then_some(s)
}

/// Map strength (and the regime, in gated mode) to a signal.
///
/// Base mode is a pure function of strength. Gated mode emits a direction
/// only when the regime agrees; a directional strength facing a contrary or
/// undetermined regime becomes [`Signal::NeutralConflict`]. A strength inside
/// the thresholds is [`Signal::Neutral`] in both modes: there is no direction
/// for the regime to contradict, so it is never reported as a conflict.
pub fn classify(
    strength: Option<f64>,
    regime: Option<Regime>,
    thresholds: &Thresholds,
    regime_gated: bool,
) -> Signal {
    let Some(strength) = strength else {
        return Signal::Neutral;
    };
    let direction = if strength > thresholds.buy_ce {
        Signal::BuyCe
    } else if strength < thresholds.buy_pe {
        Signal::BuyPe
    } else {
        return Signal::Neutral;
    };

    if !regime_gated {
        return direction;
    }
    match (direction, regime) {
        (Signal::BuyCe, Some(Regime::Bullish)) | (Signal::BuyPe, Some(Regime::Bearish)) => {
            direction
        }
        _ => Signal::NeutralConflict,
    }
}

/// Composite inputs for every row: the latest non-null rolling correlations
/// and imbalance available at or before the row.
pub fn composite_inputs(table: &SnapshotTable, config: &AnalysisConfig) -> Vec<CompositeInputs> {
    let r_oi = carried_correlation(table, CorrPair::PriceOi, config.composite);
    let r_vol = carried_correlation(table, CorrPair::PriceVolume, config.composite);
    let imbalance = forward_fill(table.column(&ColumnKey::OiImbalance), table.len());

    (0..table.len())
        .map(|i| CompositeInputs {
            r_price_oi: r_oi[i],
            r_price_vol: r_vol[i],
            oi_imbalance: imbalance[i],
        })
        .collect()
}

/// Append the per-row strength column.
pub fn append_strength(
    table: &SnapshotTable,
    config: &AnalysisConfig,
) -> Result<SnapshotTable, TableError> {
    let strength = composite_inputs(table, config)
        .iter()
        .map(|inputs| composite_strength(inputs, &config.weights))
        .collect();
    table.with_column(ColumnKey::Strength, strength)
}

/// Correlation term for `pair`, carried forward to every row. `None` until
/// the first defined value.
fn carried_correlation(
    table: &SnapshotTable,
    pair: CorrPair,
    basis: CompositeBasis,
) -> Vec<Option<f64>> {
    let carried = |side| {
        forward_fill(
            table.column(&ColumnKey::RollingCorr { side, pair }),
            table.len(),
        )
    };
    let primary = carried(Side::PRIMARY);

    match basis {
        CompositeBasis::Primary => primary,
        CompositeBasis::Differential => {
            let other = carried(Side::PRIMARY.opposite());
            primary
                .into_iter()
                .zip(other)
                .map(|(p, o)| match (p, o) {
                    (None, None) => None,
                    (p, o) => Some(p.unwrap_or(0.0) - o.unwrap_or(0.0)),
                })
                .collect()
        }
    }
}

fn forward_fill(column: Option<&[Option<f64>]>, len: usize) -> Vec<Option<f64>> {
    let Some(column) = column else {
        return vec![None; len];
    };
    let mut last = None;
    column
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}
