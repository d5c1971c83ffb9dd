use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use chain_signal::model::{ConfigOverrides, StrikeMode};
use chain_signal::summary::table::OutputFormat;

/// Option-chain CE/PE snapshot analysis: rolling correlations, OI lead-lag,
/// composite strength and BUY_CE / BUY_PE / NEUTRAL signals.
#[derive(Parser)]
#[command(name = "chain-signal", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyze snapshot CSVs and print one summary row per source
    Analyze {
        /// CSV files or directories of CSV files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,

        /// Treat all inputs as one time series instead of one source per file
        #[arg(long)]
        combine: bool,

        /// Analyze sources on a thread pool
        #[arg(long)]
        parallel: bool,

        /// Write the summary to this file (CSV, or JSON for a .json path)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Output format: table (default), csv, or json
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print lag table, regime flips and diagnostics for each source
    Inspect {
        /// CSV files or directories of CSV files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,

        /// Treat all inputs as one time series
        #[arg(long)]
        combine: bool,

        /// Directory to write each analyzed table to
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Output the JSON schema of the analysis config
    Schema,

    /// Output an example analysis config JSON to stdout
    Example,

    /// Validate an analysis config JSON file
    Validate {
        /// Path to the config JSON file
        file: PathBuf,
    },
}

/// Config file plus per-field overrides.
#[derive(Args)]
pub struct ConfigArgs {
    /// Analysis config JSON (defaults apply to missing fields)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Rolling correlation window in rows
    #[arg(long)]
    pub window: Option<usize>,

    /// Smallest lag searched
    #[arg(long, allow_hyphen_values = true)]
    pub lag_min: Option<i32>,

    /// Largest lag searched
    #[arg(long, allow_hyphen_values = true)]
    pub lag_max: Option<i32>,

    /// Strength above which BUY_CE is signalled
    #[arg(long, allow_hyphen_values = true)]
    pub buy_ce: Option<f64>,

    /// Strength below which BUY_PE is signalled
    #[arg(long, allow_hyphen_values = true)]
    pub buy_pe: Option<f64>,

    /// Require the regime to confirm directional signals
    #[arg(long, conflicts_with = "no_regime_gated")]
    pub regime_gated: bool,

    /// Signal from strength alone, even if the config file enables gating
    #[arg(long)]
    pub no_regime_gated: bool,

    /// Keep only rows at this strike
    #[arg(long, conflicts_with = "aggregate_strikes")]
    pub strike: Option<f64>,

    /// Collapse rows of all strikes sharing a timestamp
    #[arg(long)]
    pub aggregate_strikes: bool,
}

impl ConfigArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        let strike = match (self.strike, self.aggregate_strikes) {
            (Some(k), _) => Some(StrikeMode::Select(k)),
            (None, true) => Some(StrikeMode::Aggregate),
            (None, false) => None,
        };
        ConfigOverrides {
            window: self.window,
            lag_min: self.lag_min,
            lag_max: self.lag_max,
            buy_ce: self.buy_ce,
            buy_pe: self.buy_pe,
            regime_gated: match (self.regime_gated, self.no_regime_gated) {
                (true, _) => Some(true),
                (false, true) => Some(false),
                (false, false) => None,
            },
            strike,
        }
    }
}
