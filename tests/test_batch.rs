
use chain_signal::data::{self, SnapshotLoader};
use chain_signal::engine::scorer::Signal;
use chain_signal::error::EmptyBatchError;
use chain_signal::model::{AnalysisConfig, StrikeMode, Thresholds};
use chain_signal::summary::{self, table::BatchSummary};

use snapshot_common::{Shape, write_file, write_polls, write_series};

// ── Helpers ─────────────────────────────────────────────────────────

fn run_batch(
    paths: &[std::path::PathBuf],
    combine: bool,
    config: &AnalysisConfig,
    parallel: bool,
) -> Result<BatchSummary, EmptyBatchError> {
    let sources = data::plan_sources(paths, combine).unwrap();
    let mut loader = SnapshotLoader::new();
    summary::summarize(&sources, &mut loader, config, parallel)
}

// ── Batch behaviour ─────────────────────────────────────────────────

#[test]
fn test_broken_file_becomes_warning() {
    let dir = tempfile::tempdir().unwrap();
    write_series(dir.path(), "a_bull.csv", Shape::Bullish, 0..40);
    write_series(dir.path(), "b_bear.csv", Shape::Bearish, 0..40);
    write_file(
        dir.path(),
        "c_broken.csv",
        "timestamp,CE_lastPrice,CE_openInterest\n2024-01-15 09:15:00,100,1000\n",
    );

    let summary = run_batch(&[dir.path().to_path_buf()], false, &AnalysisConfig::default(), false)
        .unwrap();

    assert_eq!(summary.records.len(), 2);
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].contains("c_broken.csv"));
    assert!(summary.warnings[0].contains("CE_totalTradedVolume"));
    assert_eq!(summary.counts.total(), 2);

    let bull = &summary.records[0];
    assert_eq!(bull.source, "a_bull.csv");
    assert_eq!(bull.rows, 40);
    assert_eq!(bull.strike, Some(22000.0));
    assert_eq!(bull.signal, Signal::BuyCe);
    assert!(bull.strength.unwrap() > 0.7);

    let bear = &summary.records[1];
    assert_eq!(bear.source, "b_bear.csv");
    assert_eq!(bear.signal, Signal::BuyPe);
    assert!(bear.oi_imbalance.unwrap() < 0.0);

    assert_eq!(summary.counts.bullish, 1);
    assert_eq!(summary.counts.bearish, 1);
    assert_eq!(summary.counts.neutral, 0);
}

#[test]
fn test_all_sources_failing_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write_file(dir.path(), "bad.csv", "foo,bar\n1,2\n");
    let mixed = {
        let mut body = snapshot_common::series_body(Shape::Bullish, 0..10);
        body.push_str(
            "2024-01-15 10:00:00,100,1000,10,14,22100,80,900,20,15,22100\n",
        );
        write_file(dir.path(), "mixed.csv", &body)
    };

    let err = run_batch(&[bad, mixed], false, &AnalysisConfig::default(), false).unwrap_err();
    assert_eq!(err.warnings.len(), 2);
    assert!(err.warnings[1].contains("mixes strikes"));
    assert!(err.to_string().contains("2 warning(s)"));
}

#[test]
fn test_selected_strike_rescues_mixed_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut body = snapshot_common::series_body(Shape::Bullish, 0..40);
    body.push_str("2024-01-15 10:30:00,100,1000,10,14,22100,80,900,20,15,22100\n");
    let path = write_file(dir.path(), "mixed.csv", &body);

    let config = AnalysisConfig {
        strike: StrikeMode::Select(22000.0),
        ..AnalysisConfig::default()
    };
    let summary = run_batch(&[path], false, &config, false).unwrap();
    assert_eq!(summary.records[0].rows, 40);
    assert_eq!(summary.records[0].strike, Some(22000.0));
}

#[test]
fn test_parallel_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    for (i, shape) in [Shape::Bearish, Shape::Bullish, Shape::Conflict, Shape::Bullish]
        .into_iter()
        .enumerate()
    {
        write_series(dir.path(), &format!("s{i}.csv"), shape, 0..(30 + i * 5));
    }
    let paths = [dir.path().to_path_buf()];
    let config = AnalysisConfig::default();

    let sequential = run_batch(&paths, false, &config, false).unwrap();
    let parallel = run_batch(&paths, false, &config, true).unwrap();
    assert_eq!(sequential, parallel);

    let sources: Vec<&str> = parallel.records.iter().map(|r| r.source.as_str()).collect();
    assert_eq!(sources, ["s0.csv", "s1.csv", "s2.csv", "s3.csv"]);
}

#[test]
fn test_regime_gating_turns_disagreement_into_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_series(dir.path(), "conflict.csv", Shape::Conflict, 0..40);
    let thresholds = Thresholds {
        buy_ce: 0.1,
        buy_pe: -0.1,
    };

    let base = AnalysisConfig {
        thresholds,
        ..AnalysisConfig::default()
    };
    let ungated = run_batch(&[path.clone()], false, &base, false).unwrap();
    let record = &ungated.records[0];
    assert_eq!(record.signal, Signal::BuyPe);
    assert_eq!(record.regime_label(), "Bullish");

    let gated = AnalysisConfig {
        regime_gated: true,
        ..base
    };
    let summary = run_batch(&[path], false, &gated, false).unwrap();
    assert_eq!(summary.records[0].signal, Signal::NeutralConflict);
    assert_eq!(summary.records[0].strength, record.strength);
    assert_eq!(summary.counts.neutral, 1);
    assert_eq!(summary.counts.conflicts, 1);
}

// ── Combined series ─────────────────────────────────────────────────

#[test]
fn test_combine_concatenates_files_in_time_order() {
    let dir = tempfile::tempdir().unwrap();
    let whole = write_series(dir.path(), "whole.csv", Shape::Bullish, 0..40);

    let parts = tempfile::tempdir().unwrap();
    // Written out of order; rows are sorted by timestamp on assembly
    let late = write_series(parts.path(), "late.csv", Shape::Bullish, 20..40);
    let early = write_series(parts.path(), "early.csv", Shape::Bullish, 0..20);

    let config = AnalysisConfig::default();
    let single = run_batch(&[whole], false, &config, false).unwrap();
    let combined = run_batch(&[late, early], true, &config, false).unwrap();

    assert_eq!(combined.records.len(), 1);
    let record = &combined.records[0];
    assert_eq!(record.source, "combined");
    assert_eq!(record.rows, 40);
    assert_eq!(record.strength, single.records[0].strength);
    assert_eq!(record.best_lag, single.records[0].best_lag);
}

#[test]
fn test_combine_polled_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    write_polls(dir.path(), Shape::Bearish, 0..25);

    let config = AnalysisConfig {
        window: 5,
        ..AnalysisConfig::default()
    };
    let summary = run_batch(&[dir.path().to_path_buf()], true, &config, false).unwrap();
    assert_eq!(summary.records.len(), 1);
    let record = &summary.records[0];
    assert_eq!(record.rows, 25);
    assert_eq!(record.signal, Signal::BuyPe);
    assert!(summary.warnings.is_empty());
}
