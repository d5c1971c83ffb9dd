use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::data::{self, SnapshotLoader};
use crate::engine::{self, Analysis};
use crate::model::{AnalysisConfig, Side};

/// Options of the `inspect` command.
pub struct InspectOptions {
    pub paths: Vec<PathBuf>,
    pub config: AnalysisConfig,
    pub combine: bool,
    pub export: Option<PathBuf>,
}

/// Print the detailed analysis of every source.
pub fn run(options: &InspectOptions) -> Result<()> {
    let sources =
        data::plan_sources(&options.paths, options.combine).context("collecting input files")?;
    if sources.is_empty() {
        anyhow::bail!("no CSV files found in the given paths");
    }
    if let Some(dir) = &options.export {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let mut loader = SnapshotLoader::new();
    let mut inspected = 0usize;
    for source in &sources {
        let analysis = match loader
            .build_table(source, options.config.strike)
            .map_err(anyhow::Error::from)
            .and_then(|table| engine::analyze(&table, &options.config).map_err(Into::into))
        {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(source = %source.id, error = %e, "skipping source");
                continue;
            }
        };
        print_analysis(&source.id, &analysis);
        if let Some(dir) = &options.export {
            let path = export_path(dir, &source.id);
            export_table(&analysis, &path)?;
            println!("  Analyzed table written to {}", path.display());
        }
        inspected += 1;
    }

    if inspected == 0 {
        anyhow::bail!("none of the {} source(s) could be analyzed", sources.len());
    }
    Ok(())
}

pub fn print_analysis(source_id: &str, analysis: &Analysis) {
    println!("\n{}", "═".repeat(72));
    println!("  {source_id}");
    println!("{}", "═".repeat(72));
    println!(
        "  rows {}  strike {}  signal {}  strength {}",
        analysis.table.len(),
        analysis
            .table
            .strike()
            .map_or_else(|| "-".to_string(), |s| format!("{s:.0}")),
        analysis.signal,
        fmt_opt(analysis.strength),
    );

    println!("\n  Whole-series correlations");
    println!("  {:<6} {:>10} {:>10}", "Side", "Px/OI", "Px/Vol");
    for side in Side::ALL {
        let c = analysis.whole_series(side);
        println!(
            "  {:<6} {:>10} {:>10}",
            side.prefix(),
            fmt_opt(c.price_oi),
            fmt_opt(c.price_vol)
        );
    }

    println!("\n  Lead-lag (positive lag: OI leads price)");
    println!("  {:>4} {:>10} {:>6}", "Lag", "Corr", "Pairs");
    for l in &analysis.lead_lag.lags {
        let marker = if l.lag == analysis.lead_lag.best_lag { " *" } else { "" };
        println!(
            "  {:>4} {:>10} {:>6}{marker}",
            l.lag,
            fmt_opt(l.correlation),
            l.pairs
        );
    }

    match analysis.regime {
        Some(regime) => println!("\n  Regime: {regime} ({} flip(s))", analysis.flips.len()),
        None => println!("\n  Regime: undetermined"),
    }
    for flip in &analysis.flips {
        println!(
            "    {}  {} -> {}",
            flip.timestamp.format("%Y-%m-%d %H:%M:%S"),
            flip.from,
            flip.to
        );
    }

    if !analysis.diagnostics.is_empty() {
        println!("\n  Diagnostics");
        for d in &analysis.diagnostics {
            println!("    {d}");
        }
    }
}

fn export_path(dir: &Path, source_id: &str) -> PathBuf {
    let stem = Path::new(source_id)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_id.to_string());
    let safe: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect();
    dir.join(format!("{safe}.analyzed.csv"))
}

fn export_table(analysis: &Analysis, path: &Path) -> Result<()> {
    let file =
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    analysis
        .table
        .write_csv(std::io::BufWriter::new(file))
        .with_context(|| format!("writing {}", path.display()))
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:+.4}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_path_sanitizes_source_id() {
        let dir = Path::new("/tmp/out");
        assert_eq!(
            export_path(dir, "nifty_20240115.csv"),
            dir.join("nifty_20240115.analyzed.csv")
        );
        assert_eq!(
            export_path(dir, "data/a b.csv"),
            dir.join("a_b.analyzed.csv")
        );
    }
}
