use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::record::SummaryRecord;
use crate::engine::scorer::Signal;

/// Decimal places kept in delimited exports.
pub const EXPORT_PRECISION: i32 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalCounts {
    /// BUY_CE
    pub bullish: usize,
    /// BUY_PE
    pub bearish: usize,
    /// NEUTRAL and NEUTRAL_CONFLICT
    pub neutral: usize,
    /// NEUTRAL_CONFLICT only, already included in `neutral`.
    pub conflicts: usize,
}

impl SignalCounts {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a SummaryRecord>) -> Self {
        let mut counts = Self::default();
        for r in records {
            match r.signal {
                Signal::BuyCe => counts.bullish += 1,
                Signal::BuyPe => counts.bearish += 1,
                Signal::Neutral => counts.neutral += 1,
                Signal::NeutralConflict => {
                    counts.neutral += 1;
                    counts.conflicts += 1;
                }
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.bullish + self.bearish + self.neutral
    }
}

/// Summary of a batch: one record per successful source, in input order,
/// plus the warnings of the sources that were excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub records: Vec<SummaryRecord>,
    pub counts: SignalCounts,
    pub warnings: Vec<String>,
}

impl BatchSummary {
    pub fn new(records: Vec<SummaryRecord>, warnings: Vec<String>) -> Self {
        let counts = SignalCounts::tally(&records);
        Self {
            records,
            counts,
            warnings,
        }
    }

    pub fn print_table(&self) {
        println!("\n{}", "═".repeat(118));
        println!("  Option Chain Signals");
        println!("{}", "═".repeat(118));
        println!(
            "  {:<32} {:>5} {:>8} {:>8} {:>8} {:>8} {:>8} {:>4} {:>8} {:<8} {:<16}",
            "Source",
            "Rows",
            "Strike",
            "rPxOI",
            "rPxVol",
            "OIImb",
            "Score",
            "Lag",
            "LagCorr",
            "Regime",
            "Signal",
        );
        println!("  {}", "-".repeat(112));
        for r in &self.records {
            println!(
                "  {:<32} {:>5} {:>8} {:>8} {:>8} {:>8} {:>8} {:>4} {:>8} {:<8} {:<16}",
                truncate(&r.source, 32),
                r.rows,
                r.strike.map_or_else(|| "-".to_string(), |s| format!("{s:.0}")),
                fixed(r.r_price_oi),
                fixed(r.r_price_vol),
                fixed(r.oi_imbalance),
                fixed(r.strength),
                r.best_lag,
                fixed(r.best_lag_corr),
                r.regime_label(),
                r.signal,
            );
        }
        println!("{}", "═".repeat(118));
        println!(
            "  Bullish: {}  Bearish: {}  Neutral: {} ({} conflict)",
            self.counts.bullish, self.counts.bearish, self.counts.neutral, self.counts.conflicts,
        );
        for w in &self.warnings {
            println!("  warning: {w}");
        }
    }

    /// Delimited export; numbers are rounded to [`EXPORT_PRECISION`] places.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> csv::Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record([
            "source",
            "rows",
            "strike",
            "r_price_oi",
            "r_price_vol",
            "oi_imbalance",
            "strength",
            "best_lag",
            "best_lag_corr",
            "lag_low_confidence",
            "regime",
            "signal",
            "corr_price_oi_ce",
            "corr_price_oi_pe",
            "corr_price_vol_ce",
            "corr_price_vol_pe",
            "regime_flips",
            "last_flip",
        ])?;
        for r in &self.records {
            out.write_record([
                r.source.clone(),
                r.rows.to_string(),
                rounded(r.strike),
                rounded(r.r_price_oi),
                rounded(r.r_price_vol),
                rounded(r.oi_imbalance),
                rounded(r.strength),
                r.best_lag.to_string(),
                rounded(r.best_lag_corr),
                r.lag_low_confidence.to_string(),
                r.regime.map(|g| g.to_string()).unwrap_or_default(),
                r.signal.to_string(),
                rounded(r.corr_price_oi_ce),
                rounded(r.corr_price_oi_pe),
                rounded(r.corr_price_vol_ce),
                rounded(r.corr_price_vol_pe),
                r.regime_flips.to_string(),
                r.last_flip
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default(),
            ])?;
        }
        out.flush()?;
        Ok(())
    }

    /// JSON export at full precision.
    pub fn write_json<W: io::Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown format `{other}` (expected table, csv or json)")),
        }
    }
}

fn round_to(v: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (v * scale).round() / scale
}

fn rounded(v: Option<f64>) -> String {
    v.map(|v| round_to(v, EXPORT_PRECISION).to_string())
        .unwrap_or_default()
}

fn fixed(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:+.3}"))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, signal: Signal, strength: Option<f64>) -> SummaryRecord {
        SummaryRecord {
            source: source.to_string(),
            rows: 30,
            strike: Some(22000.0),
            r_price_oi: Some(0.123456),
            r_price_vol: None,
            oi_imbalance: Some(0.2),
            strength,
            best_lag: 1,
            best_lag_corr: Some(0.87654),
            lag_low_confidence: false,
            regime: None,
            signal,
            corr_price_oi_ce: None,
            corr_price_oi_pe: None,
            corr_price_vol_ce: None,
            corr_price_vol_pe: None,
            regime_flips: 0,
            last_flip: None,
        }
    }

    #[test]
    fn test_counts_fold_conflicts_into_neutral() {
        let summary = BatchSummary::new(
            vec![
                record("a", Signal::BuyCe, Some(0.3)),
                record("b", Signal::NeutralConflict, Some(0.3)),
                record("c", Signal::Neutral, None),
                record("d", Signal::BuyPe, Some(-0.4)),
            ],
            Vec::new(),
        );
        assert_eq!(
            summary.counts,
            SignalCounts {
                bullish: 1,
                bearish: 1,
                neutral: 2,
                conflicts: 1
            }
        );
        assert_eq!(summary.counts.total(), 4);
    }

    #[test]
    fn test_csv_rounds_only_at_export() {
        let summary = BatchSummary::new(vec![record("a", Signal::BuyCe, Some(0.300049))], vec![]);
        let mut buf = Vec::new();
        summary.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with("a,30,22000,0.123,,0.2,0.3,1,0.877,false,,BUY_CE"));
        assert_eq!(summary.records[0].strength, Some(0.300049));

        let mut json = Vec::new();
        summary.write_json(&mut json).unwrap();
        let back: BatchSummary = serde_json::from_slice(&json).unwrap();
        assert_eq!(back.records[0].r_price_oi, Some(0.123456));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("CSV".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
