//! Lead-lag search between open interest and price.

use serde::Serialize;

use super::stats;
use crate::model::LagRange;

/// Correlation of `price[i]` with `oi[i - lag]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LagCorrelation {
    pub lag: i32,
    pub correlation: Option<f64>,
    /// Number of rows where both operands were defined.
    pub pairs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadLag {
    /// One entry per lag, ascending.
    pub lags: Vec<LagCorrelation>,
    /// Lag with the highest correlation. Positive: open interest leads price.
    pub best_lag: i32,
    pub best_correlation: Option<f64>,
    /// Set when no lag had a defined correlation and `best_lag` fell back to 0.
    pub low_confidence: bool,
}

/// Correlate `price` against `oi` shifted by every lag in `range`.
///
/// Pairs are pairwise-complete: a row counts for a lag when both
/// `price[i]` and `oi[i - lag]` exist. Ties keep the smallest lag.
pub fn lead_lag(price: &[Option<f64>], oi: &[Option<f64>], range: &LagRange) -> LeadLag {
    let lags: Vec<LagCorrelation> = range
        .lags()
        .map(|lag| lag_correlation(price, oi, lag))
        .collect();

    let best = lags
        .iter()
        .filter_map(|l| l.correlation.map(|r| (l.lag, r)))
        .fold(None, |best: Option<(i32, f64)>, (lag, r)| match best {
            Some((_, best_r)) if r <= best_r => best,
            _ => Some((lag, r)),
        });

    match best {
        Some((best_lag, r)) => LeadLag {
            lags,
            best_lag,
            best_correlation: Some(r),
            low_confidence: false,
        },
        None => LeadLag {
            lags,
            best_lag: 0,
            best_correlation: None,
            low_confidence: true,
        },
    }
}

fn lag_correlation(price: &[Option<f64>], oi: &[Option<f64>], lag: i32) -> LagCorrelation {
    let n = price.len().min(oi.len());
    let shift = lag.unsigned_abs() as usize;

    let (xs, ys) = if shift >= n {
        (Vec::new(), Vec::new())
    } else if lag >= 0 {
        // price[i] with oi[i - lag], i in lag..n
        stats::complete_pairs(
            price[shift..n]
                .iter()
                .copied()
                .zip(oi[..n - shift].iter().copied()),
        )
    } else {
        // price[i] with oi[i + |lag|], i in 0..n - |lag|
        stats::complete_pairs(
            price[..n - shift]
                .iter()
                .copied()
                .zip(oi[shift..n].iter().copied()),
        )
    };

    LagCorrelation {
        lag,
        correlation: stats::pearson(&xs, &ys),
        pairs: xs.len(),
    }
}
