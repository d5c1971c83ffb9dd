use crate::model::{AnalysisConfig, CompositeBasis, CorrelationBasis, LagRange, StrikeMode};

/// Example configuration: the defaults, spelled out, with regime gating on.
pub fn config() -> AnalysisConfig {
    AnalysisConfig {
        window: 20,
        lag_range: LagRange::new(-3, 3),
        regime_gated: true,
        basis: CorrelationBasis::Deltas,
        composite: CompositeBasis::Primary,
        strike: StrikeMode::Single,
        ..AnalysisConfig::default()
    }
}

/// Print an example configuration JSON to stdout.
pub fn run() -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&config())?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate;

    #[test]
    fn test_example_config_is_valid() {
        let config = config();
        assert!(validate::validate(&config).is_ok());

        let json = serde_json::to_string(&config).unwrap();
        let parsed: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
