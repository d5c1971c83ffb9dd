use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::engine::rolling::Regime;
use crate::engine::scorer::Signal;
use crate::engine::Analysis;
use crate::model::Side;

/// Headline metrics of one analyzed source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub source: String,
    pub rows: usize,
    pub strike: Option<f64>,
    /// Latest defined rolling price/OI correlation feeding the score.
    pub r_price_oi: Option<f64>,
    pub r_price_vol: Option<f64>,
    pub oi_imbalance: Option<f64>,
    pub strength: Option<f64>,
    pub best_lag: i32,
    pub best_lag_corr: Option<f64>,
    pub lag_low_confidence: bool,
    pub regime: Option<Regime>,
    pub signal: Signal,
    pub corr_price_oi_ce: Option<f64>,
    pub corr_price_oi_pe: Option<f64>,
    pub corr_price_vol_ce: Option<f64>,
    pub corr_price_vol_pe: Option<f64>,
    pub regime_flips: usize,
    pub last_flip: Option<NaiveDateTime>,
}

impl SummaryRecord {
    pub fn from_analysis(source: &str, analysis: &Analysis) -> Self {
        let ce = analysis.whole_series(Side::Call);
        let pe = analysis.whole_series(Side::Put);
        Self {
            source: source.to_string(),
            rows: analysis.table.len(),
            strike: analysis.table.strike(),
            r_price_oi: analysis.inputs.r_price_oi,
            r_price_vol: analysis.inputs.r_price_vol,
            oi_imbalance: analysis.inputs.oi_imbalance,
            strength: analysis.strength,
            best_lag: analysis.lead_lag.best_lag,
            best_lag_corr: analysis.lead_lag.best_correlation,
            lag_low_confidence: analysis.lead_lag.low_confidence,
            regime: analysis.regime,
            signal: analysis.signal,
            corr_price_oi_ce: ce.price_oi,
            corr_price_oi_pe: pe.price_oi,
            corr_price_vol_ce: ce.price_vol,
            corr_price_vol_pe: pe.price_vol,
            regime_flips: analysis.flips.len(),
            last_flip: analysis.flips.last().map(|f| f.timestamp),
        }
    }

    pub fn regime_label(&self) -> &'static str {
        match self.regime {
            Some(Regime::Bullish) => "Bullish",
            Some(Regime::Bearish) => "Bearish",
            None => "-",
        }
    }
}
