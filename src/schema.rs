use schemars::schema_for;

use crate::model::AnalysisConfig;

/// Generate and print the JSON Schema for `AnalysisConfig`.
pub fn run() -> anyhow::Result<()> {
    let schema = schema_for!(AnalysisConfig);
    let json = serde_json::to_string_pretty(&schema)?;
    println!("{json}");
    Ok(())
}
