use std::path::Path;

use thiserror::Error;

use crate::model::AnalysisConfig;

/// Largest absolute lag the lead-lag search accepts, in snapshot steps.
pub const MAX_ABS_LAG: i32 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("window must be greater than 0")]
    ZeroWindow,

    #[error("lag_range min {min} is greater than max {max}")]
    InvertedLagRange { min: i32, max: i32 },

    #[error("lag_range bound {lag} exceeds the maximum of ±{max} steps")]
    LagOutOfRange { lag: i32, max: i32 },

    #[error("thresholds.buy_pe {buy_pe} must be below thresholds.buy_ce {buy_ce}")]
    InvertedThresholds { buy_ce: f64, buy_pe: f64 },

    #[error("`{field}` is not a finite number ({value})")]
    NonFinite { field: &'static str, value: f64 },
}

/// Load and fully validate an analysis configuration from a JSON file.
pub fn load_and_validate(path: &Path) -> Result<AnalysisConfig, Vec<ConfigError>> {
    let contents = std::fs::read_to_string(path).map_err(|e| vec![ConfigError::Io(e)])?;
    let config: AnalysisConfig =
        serde_json::from_str(&contents).map_err(|e| vec![ConfigError::Json(e)])?;
    validate(&config)?;
    Ok(config)
}

/// Validate a configuration, collecting all errors.
pub fn validate(config: &AnalysisConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.window == 0 {
        errors.push(ConfigError::ZeroWindow);
    }
    let lags = config.lag_range;
    if lags.min > lags.max {
        errors.push(ConfigError::InvertedLagRange {
            min: lags.min,
            max: lags.max,
        });
    }
    for lag in [lags.min, lags.max] {
        if lag.unsigned_abs() > MAX_ABS_LAG.unsigned_abs() {
            errors.push(ConfigError::LagOutOfRange {
                lag,
                max: MAX_ABS_LAG,
            });
        }
    }

    let t = config.thresholds;
    let w = config.weights;
    let numbers = [
        ("thresholds.buy_ce", t.buy_ce),
        ("thresholds.buy_pe", t.buy_pe),
        ("weights.price_oi", w.price_oi),
        ("weights.price_vol", w.price_vol),
        ("weights.imbalance", w.imbalance),
    ];
    errors.extend(
        numbers
            .into_iter()
            .filter(|(_, v)| !v.is_finite())
            .map(|(field, value)| ConfigError::NonFinite { field, value }),
    );
    if t.buy_ce.is_finite() && t.buy_pe.is_finite() && t.buy_pe >= t.buy_ce {
        errors.push(ConfigError::InvertedThresholds {
            buy_ce: t.buy_ce,
            buy_pe: t.buy_pe,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// CLI entry point for the `validate` subcommand.
pub fn run(path: &Path) -> anyhow::Result<()> {
    match load_and_validate(path) {
        Ok(config) => {
            println!(
                "Config is valid. window {}, lags {}..={}, thresholds {:+}/{:+}, {}.",
                config.window,
                config.lag_range.min,
                config.lag_range.max,
                config.thresholds.buy_ce,
                config.thresholds.buy_pe,
                if config.regime_gated {
                    "regime-gated"
                } else {
                    "base mode"
                },
            );
            Ok(())
        }
        Err(errors) => {
            eprintln!("Validation failed with {} error(s):", errors.len());
            for (i, e) in errors.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, e);
            }
            std::process::exit(1);
        }
    }
}
