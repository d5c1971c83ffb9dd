pub mod features;
pub mod lead_lag;
pub mod rolling;
pub mod scorer;
pub mod stats;

use serde::Serialize;

use crate::error::{AnalysisError, Diagnostic};
use crate::model::{AnalysisConfig, ColumnKey, CorrPair, Side, SnapshotTable};

use lead_lag::LeadLag;
use rolling::{FlipEvent, Regime};
use scorer::{CompositeInputs, Signal};

/// Whole-series correlations of one side, pairwise-complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SeriesCorrelations {
    pub price_oi: Option<f64>,
    pub price_vol: Option<f64>,
}

/// Everything derived from one snapshot table.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Final table version with every derived column.
    pub table: SnapshotTable,
    /// Composite inputs at the last row.
    pub inputs: CompositeInputs,
    /// Last non-null strength.
    pub strength: Option<f64>,
    pub signal: Signal,
    /// Regime of the primary side's rolling price/OI correlation.
    pub regime: Option<Regime>,
    /// Regime changes of the primary side's rolling price/OI correlation.
    pub flips: Vec<FlipEvent>,
    /// Open-interest vs price lag search on the primary side.
    pub lead_lag: LeadLag,
    /// Indexed by side: call, put.
    pub whole_series: [SeriesCorrelations; 2],
    pub diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    pub fn whole_series(&self, side: Side) -> SeriesCorrelations {
        self.whole_series[side.index()]
    }
}

/// Feature, rolling-statistics, lead-lag and scoring pipeline for one config.
///
/// Each stage takes the previous table version and returns a new one; the
/// input table is never modified.
pub struct Engine {
    config: AnalysisConfig,
}

impl Engine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn analyze(&self, table: &SnapshotTable) -> Result<Analysis, AnalysisError> {
        analyze(table, &self.config)
    }
}

/// Run the full pipeline over `table`.
pub fn analyze(table: &SnapshotTable, config: &AnalysisConfig) -> Result<Analysis, AnalysisError> {
    if table.is_empty() {
        return Err(AnalysisError::EmptyTable);
    }

    let (table, mut diagnostics) = features::derive_features(table, &Side::ALL)?;
    if !Side::ALL.iter().any(|s| features::has_features(&table, *s)) {
        return Err(AnalysisError::NoUsableSide);
    }

    let (table, rolling_notes) = rolling::append_rolling(&table, config)?;
    diagnostics.extend(rolling_notes);
    let table = scorer::append_strength(&table, config)?;

    let primary_corr = table
        .column(&ColumnKey::RollingCorr {
            side: Side::PRIMARY,
            pair: CorrPair::PriceOi,
        })
        .unwrap_or(&[]);
    let regime = rolling::regime(primary_corr);
    let flips = rolling::sign_flips(primary_corr, table.timestamps());

    let (price, oi) =
        rolling::correlation_inputs(&table, Side::PRIMARY, CorrPair::PriceOi, config.basis)
            .unwrap_or((&[], &[]));
    let lag_search = lead_lag::lead_lag(price, oi, &config.lag_range);
    if lag_search.low_confidence {
        diagnostics.push(Diagnostic::InsufficientHistory {
            metric: "lead_lag".to_string(),
            available: lag_search.lags.iter().map(|l| l.pairs).max().unwrap_or(0),
            required: 2,
        });
    }

    let whole_series = Side::ALL.map(|side| SeriesCorrelations {
        price_oi: whole_series_correlation(&table, side, CorrPair::PriceOi, config),
        price_vol: whole_series_correlation(&table, side, CorrPair::PriceVolume, config),
    });

    let inputs = scorer::composite_inputs(&table, config)
        .last()
        .copied()
        .unwrap_or_default();
    let strength = table.last_valid(&ColumnKey::Strength);
    let signal = scorer::classify(strength, regime, &config.thresholds, config.regime_gated);

    tracing::debug!(
        rows = table.len(),
        ?strength,
        ?regime,
        best_lag = lag_search.best_lag,
        %signal,
        "analysis complete"
    );

    Ok(Analysis {
        table,
        inputs,
        strength,
        signal,
        regime,
        flips,
        lead_lag: lag_search,
        whole_series,
        diagnostics,
    })
}

fn whole_series_correlation(
    table: &SnapshotTable,
    side: Side,
    pair: CorrPair,
    config: &AnalysisConfig,
) -> Option<f64> {
    let (x, y) = rolling::correlation_inputs(table, side, pair, config.basis)?;
    stats::pairwise_correlation(x, y)
}
