use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Analysis configuration shared by every pipeline stage.
///
/// Every field has a default, so `{}` is a valid configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisConfig {
    /// Rolling correlation window length in rows. Must be > 0. Default: 20.
    #[serde(default = "default_window")]
    pub window: usize,

    /// Inclusive lag range searched by the lead-lag analyzer, in snapshot steps.
    #[serde(default)]
    pub lag_range: LagRange,

    /// Composite strength thresholds for directional signals.
    #[serde(default)]
    pub thresholds: Thresholds,

    /// Require the regime to confirm a directional signal.
    /// When false the signal is a pure function of strength.
    #[serde(default)]
    pub regime_gated: bool,

    /// Weights of the composite strength terms.
    #[serde(default)]
    pub weights: Weights,

    /// Whether correlations use first differences or raw levels.
    #[serde(default)]
    pub basis: CorrelationBasis,

    /// How the correlation terms of the composite are formed.
    #[serde(default)]
    pub composite: CompositeBasis,

    /// How rows from different strikes are treated when building a table.
    #[serde(default)]
    pub strike: StrikeMode,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            lag_range: LagRange::default(),
            thresholds: Thresholds::default(),
            regime_gated: false,
            weights: Weights::default(),
            basis: CorrelationBasis::default(),
            composite: CompositeBasis::default(),
            strike: StrikeMode::default(),
        }
    }
}

fn default_window() -> usize {
    20
}

/// Inclusive integer lag interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LagRange {
    pub min: i32,
    pub max: i32,
}

impl LagRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Lags in ascending order.
    pub fn lags(&self) -> impl Iterator<Item = i32> {
        self.min..=self.max
    }
}

impl Default for LagRange {
    fn default() -> Self {
        Self { min: -3, max: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Thresholds {
    /// Strength strictly above this is a call-side buy. Default: 0.2.
    #[serde(default = "default_buy_ce")]
    pub buy_ce: f64,

    /// Strength strictly below this is a put-side buy. Default: -0.2.
    #[serde(default = "default_buy_pe")]
    pub buy_pe: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            buy_ce: default_buy_ce(),
            buy_pe: default_buy_pe(),
        }
    }
}

fn default_buy_ce() -> f64 {
    0.2
}
fn default_buy_pe() -> f64 {
    -0.2
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Weights {
    /// Weight of the price/open-interest correlation. Default: 0.4.
    #[serde(default = "default_price_oi_weight")]
    pub price_oi: f64,

    /// Weight of the price/volume correlation. Default: 0.3.
    #[serde(default = "default_price_vol_weight")]
    pub price_vol: f64,

    /// Weight of the CE/PE open-interest imbalance. Default: 0.3.
    #[serde(default = "default_imbalance_weight")]
    pub imbalance: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            price_oi: default_price_oi_weight(),
            price_vol: default_price_vol_weight(),
            imbalance: default_imbalance_weight(),
        }
    }
}

fn default_price_oi_weight() -> f64 {
    0.4
}
fn default_price_vol_weight() -> f64 {
    0.3
}
fn default_imbalance_weight() -> f64 {
    0.3
}

/// Series fed to the correlation stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationBasis {
    /// Correlate first differences (ΔPrice vs ΔOI, ΔPrice vs ΔVolume).
    #[default]
    Deltas,
    /// Correlate raw levels (price vs OI, price vs volume).
    Levels,
}

/// Correlation terms of the composite strength.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompositeBasis {
    /// Call-side correlations only.
    #[default]
    Primary,
    /// Call-side minus put-side correlations.
    Differential,
}

/// Strike handling when a table is assembled from raw rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StrikeMode {
    /// All rows must share one strike.
    #[default]
    Single,
    /// Collapse rows sharing a timestamp across strikes.
    Aggregate,
    /// Keep only rows at this strike.
    Select(f64),
}

/// Command-line overrides applied on top of a loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub window: Option<usize>,
    pub lag_min: Option<i32>,
    pub lag_max: Option<i32>,
    pub buy_ce: Option<f64>,
    pub buy_pe: Option<f64>,
    /// `Some(false)` switches a gated config file back to base mode.
    pub regime_gated: Option<bool>,
    pub strike: Option<StrikeMode>,
}

impl AnalysisConfig {
    pub fn apply(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(window) = overrides.window {
            self.window = window;
        }
        if let Some(min) = overrides.lag_min {
            self.lag_range.min = min;
        }
        if let Some(max) = overrides.lag_max {
            self.lag_range.max = max;
        }
        if let Some(buy_ce) = overrides.buy_ce {
            self.thresholds.buy_ce = buy_ce;
        }
        if let Some(buy_pe) = overrides.buy_pe {
            self.thresholds.buy_pe = buy_pe;
        }
        if let Some(gated) = overrides.regime_gated {
            self.regime_gated = gated;
        }
        if let Some(strike) = overrides.strike {
            self.strike = strike;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config: AnalysisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.window, 20);
        assert_eq!(config.lag_range.lags().collect::<Vec<_>>(), vec![-3, -2, -1, 0, 1, 2, 3]);
        assert!(!config.regime_gated);
    }

    #[test]
    fn test_strike_mode_forms() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"strike": {"select": 22000.0}, "basis": "levels"}"#).unwrap();
        assert_eq!(config.strike, StrikeMode::Select(22000.0));
        assert_eq!(config.basis, CorrelationBasis::Levels);

        let config: AnalysisConfig = serde_json::from_str(r#"{"strike": "aggregate"}"#).unwrap();
        assert_eq!(config.strike, StrikeMode::Aggregate);
    }

    #[test]
    fn test_overrides() {
        let config = AnalysisConfig::default().apply(&ConfigOverrides {
            window: Some(5),
            lag_max: Some(6),
            regime_gated: Some(true),
            ..Default::default()
        });
        assert_eq!(config.window, 5);
        assert_eq!(config.lag_range, LagRange::new(-3, 6));
        assert!(config.regime_gated);
        assert_eq!(config.thresholds, Thresholds::default());
    }

    #[test]
    fn test_override_can_disable_gating() {
        let gated: AnalysisConfig = serde_json::from_str(r#"{"regime_gated": true}"#).unwrap();

        let kept = gated.clone().apply(&ConfigOverrides::default());
        assert!(kept.regime_gated);

        let base = gated.apply(&ConfigOverrides {
            regime_gated: Some(false),
            ..Default::default()
        });
        assert!(!base.regime_gated);
    }
}
