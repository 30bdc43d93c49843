//! Integration tests for the runner: config file → candle file → run → report.
//!
//! A candle CSV is written from the seeded synthetic generator so the whole
//! load/clean path is exercised against a real file.

use std::io::Write;
use std::path::Path;

use bandrev_core::signals::SignalParams;
use bandrev_runner::config::BacktestConfig;
use bandrev_runner::data_loader::{generate_synthetic_bars, load_market, LoadOptions};
use bandrev_runner::export::{import_json, save_artifacts};
use bandrev_runner::labels::render_report;
use bandrev_runner::runner::run_backtest;
use chrono::{Duration, NaiveDate};

fn write_candles(dir: &Path, count: usize) -> std::path::PathBuf {
    let start = NaiveDate::from_ymd_opt(2023, 11, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let bars = generate_synthetic_bars("fixture", start, count, Duration::minutes(15));

    let path = dir.join("candles.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "candle_begin_time,open,high,low,close,volume").unwrap();
    // Reversed order with one duplicate: the loader must sort and dedupe.
    for bar in bars.iter().rev().chain(bars.first()) {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        )
        .unwrap();
    }
    path
}

fn config_for(path: &Path) -> BacktestConfig {
    let text = format!(
        r#"
[data]
path = "{}"
interval_minutes = 15

[report]
locale = "zh"
"#,
        path.display()
    );
    BacktestConfig::from_toml_str(&text).unwrap()
}

fn load_opts(config: &BacktestConfig) -> LoadOptions {
    LoadOptions {
        path: config.data.path.clone(),
        clean: config.data.clean_options().unwrap(),
        ..LoadOptions::default()
    }
}

#[test]
fn file_backed_run_produces_report() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_candles(dir.path(), 6_000);
    let config = config_for(&csv);

    let ctx = load_market(&load_opts(&config)).unwrap();
    assert_eq!(ctx.len(), 6_000);
    assert!(ctx.bars().windows(2).all(|w| w[0].timestamp < w[1].timestamp));

    let params = SignalParams::new(50, 1.0, 0.05).unwrap();
    let result = run_backtest(&ctx, &params, &config.run_settings()).unwrap();

    let report = &result.report;
    assert!(report.trade_count > 0);
    assert_eq!(report.win_count + report.loss_count, report.trade_count);
    assert!(report.max_drawdown <= 0.0);
    assert!(report.drawdown_start <= report.drawdown_end);
    assert!((report.cumulative_return - result.final_equity).abs() < 1e-12);
    // November 2023 through January 2024
    assert_eq!(report.monthly_returns.len(), 3);

    let text = render_report(report, &config.label_map().unwrap());
    assert!(text.contains("累积净值"));
}

#[test]
fn artifacts_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_candles(dir.path(), 4_000);
    let config = config_for(&csv);
    let ctx = load_market(&load_opts(&config)).unwrap();

    let params = SignalParams::new(40, 1.0, 0.05).unwrap();
    let result = run_backtest(&ctx, &params, &config.run_settings()).unwrap();

    let out = dir.path().join("report");
    let written = save_artifacts(&result, &out).unwrap();
    assert_eq!(written.len(), 3);

    let json = std::fs::read_to_string(out.join("report.json")).unwrap();
    let restored = import_json(&json).unwrap();
    assert_eq!(restored.report, result.report);
    assert_eq!(restored.trades, result.trades);
    assert_eq!(restored.dataset_hash, ctx.dataset_hash);

    let equity = std::fs::read_to_string(out.join("equity.csv")).unwrap();
    assert_eq!(equity.lines().count(), ctx.len() + 1);
    let trades = std::fs::read_to_string(out.join("trades.csv")).unwrap();
    assert_eq!(trades.lines().count(), result.trades.len() + 1);
}

#[test]
fn same_file_gives_same_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_candles(dir.path(), 500);
    let config = config_for(&csv);
    let a = load_market(&load_opts(&config)).unwrap();
    let b = load_market(&load_opts(&config)).unwrap();
    assert_eq!(a.dataset_hash, b.dataset_hash);
}
