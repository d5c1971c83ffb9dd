pub mod record;
pub mod table;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::data::{self, SnapshotLoader, Source};
use crate::engine;
use crate::error::{EmptyBatchError, SourceError};
use crate::model::{AnalysisConfig, SnapshotTable};

use record::SummaryRecord;
use table::{BatchSummary, OutputFormat};

/// Options of the `analyze` command.
pub struct AnalyzeOptions {
    pub paths: Vec<PathBuf>,
    pub config: AnalysisConfig,
    pub combine: bool,
    pub parallel: bool,
    pub output: Option<PathBuf>,
    pub format: OutputFormat,
}

/// Run a batch analysis from the CLI.
pub fn run(options: &AnalyzeOptions) -> Result<()> {
    let sources =
        data::plan_sources(&options.paths, options.combine).context("collecting input files")?;
    if sources.is_empty() {
        anyhow::bail!("no CSV files found in the given paths");
    }
    tracing::info!(
        sources = sources.len(),
        parallel = options.parallel,
        window = options.config.window,
        "analyzing snapshot batch"
    );

    let mut loader = SnapshotLoader::new();
    let summary =
        summarize(&sources, &mut loader, &options.config, options.parallel).map_err(|e| {
            anyhow::anyhow!("{e}:\n  {}", e.warnings.join("\n  "))
        })?;

    match &options.output {
        Some(path) => {
            write_summary(&summary, path, options.format)?;
            summary.print_table();
            println!("  Summary written to {}", path.display());
        }
        None => match options.format {
            OutputFormat::Table => summary.print_table(),
            OutputFormat::Csv => summary
                .write_csv(std::io::stdout().lock())
                .context("writing CSV to stdout")?,
            OutputFormat::Json => {
                summary
                    .write_json(std::io::stdout().lock())
                    .context("writing JSON to stdout")?;
                println!();
            }
        },
    }
    Ok(())
}

/// Load, analyze and summarize every source.
///
/// Loading is sequential. Analysis runs on the rayon pool when `parallel` is
/// set; either way records come back in source order. A source that fails to
/// load or analyze becomes a warning. If no source succeeds the batch fails.
pub fn summarize(
    sources: &[Source],
    loader: &mut SnapshotLoader,
    config: &AnalysisConfig,
    parallel: bool,
) -> Result<BatchSummary, EmptyBatchError> {
    let loaded: Vec<(&str, Result<SnapshotTable, SourceError>)> = sources
        .iter()
        .map(|source| {
            let table =
                loader
                    .build_table(source, config.strike)
                    .map_err(|reason| SourceError::FileParse {
                        source_id: source.id.clone(),
                        reason,
                    });
            (source.id.as_str(), table)
        })
        .collect();

    let outcomes = analyze_all(loaded, config, parallel);

    let mut records = Vec::with_capacity(outcomes.len());
    let mut warnings = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(source = e.source_id(), error = %e, "source excluded from summary");
                warnings.push(e.to_string());
            }
        }
    }

    if records.is_empty() {
        return Err(EmptyBatchError { warnings });
    }
    Ok(BatchSummary::new(records, warnings))
}

/// Analyze one loaded table into its summary record.
pub fn summarize_table(
    source_id: &str,
    table: &SnapshotTable,
    config: &AnalysisConfig,
) -> Result<SummaryRecord, SourceError> {
    let analysis = engine::analyze(table, config).map_err(|reason| SourceError::Analysis {
        source_id: source_id.to_string(),
        reason,
    })?;
    for note in &analysis.diagnostics {
        tracing::debug!(source = source_id, %note, "degraded metric");
    }
    Ok(SummaryRecord::from_analysis(source_id, &analysis))
}

#[cfg(feature = "full")]
fn analyze_all(
    loaded: Vec<(&str, Result<SnapshotTable, SourceError>)>,
    config: &AnalysisConfig,
    parallel: bool,
) -> Vec<Result<SummaryRecord, SourceError>> {
    use rayon::prelude::*;

    if parallel {
        loaded
            .into_par_iter()
            .map(|(id, table)| summarize_table(id, &table?, config))
            .collect()
    } else {
        loaded
            .into_iter()
            .map(|(id, table)| summarize_table(id, &table?, config))
            .collect()
    }
}

#[cfg(not(feature = "full"))]
fn analyze_all(
    loaded: Vec<(&str, Result<SnapshotTable, SourceError>)>,
    config: &AnalysisConfig,
    _parallel: bool,
) -> Vec<Result<SummaryRecord, SourceError>> {
    loaded
        .into_iter()
        .map(|(id, table)| summarize_table(id, &table?, config))
        .collect()
}

fn write_summary(summary: &BatchSummary, path: &Path, format: OutputFormat) -> Result<()> {
    let format = match format {
        OutputFormat::Table => match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => OutputFormat::Json,
            _ => OutputFormat::Csv,
        },
        other => other,
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let writer = std::io::BufWriter::new(file);
    match format {
        OutputFormat::Json => summary
            .write_json(writer)
            .with_context(|| format!("writing {}", path.display()))?,
        _ => summary
            .write_csv(writer)
            .with_context(|| format!("writing {}", path.display()))?,
    }
    Ok(())
}
