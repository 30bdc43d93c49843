//! Artifact export — sweep result file, trade tape, equity curve, report JSON.
//!
//! String builders are separated from the file writers so the formats can be
//! tested without touching disk.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use bandrev_core::domain::Trade;
use bandrev_core::engine::Simulation;

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::sweep::SweepRow;

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ─── Sweep ──────────────────────────────────────────────────────────

/// Sweep rows as CSV: `n,m,l,equity_curve,error`.
pub fn export_sweep_csv(rows: &[SweepRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["n", "m", "l", "equity_curve", "error"])?;
    for r in rows {
        wtr.write_record([
            r.n.to_string(),
            r.m.to_string(),
            r.l.to_string(),
            opt(r.equity_curve),
            r.error.clone().unwrap_or_default(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn write_sweep_csv(rows: &[SweepRow], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output dir: {}", parent.display()))?;
    }
    let csv = export_sweep_csv(rows)?;
    std::fs::write(path, csv)
        .with_context(|| format!("failed to write sweep results: {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "wrote sweep results");
    Ok(())
}

// ─── Single run ─────────────────────────────────────────────────────

/// Trade tape, one row per position run.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "start",
        "end",
        "direction",
        "leverage",
        "entry_price",
        "exit_price",
        "bar_count",
        "change",
        "end_equity",
        "min_equity",
    ])?;
    for t in trades {
        wtr.write_record([
            t.start.to_string(),
            t.end.to_string(),
            t.direction.as_i8().to_string(),
            opt(t.leverage),
            format!("{:.6}", t.entry_price),
            format!("{:.6}", t.exit_price),
            t.bar_count.to_string(),
            format!("{:.8}", t.change),
            format!("{:.8}", t.end_equity),
            format!("{:.8}", t.min_equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Per-bar equity curve with position, net value and liquidation flag.
pub fn export_equity_csv(sim: &Simulation) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "candle_begin_time",
        "close",
        "pos",
        "net_value",
        "margin_ratio",
        "liquidated",
        "equity_change",
        "equity_curve",
    ])?;
    for sb in &sim.bars {
        let account = sb.account.as_ref();
        wtr.write_record([
            sb.bar.timestamp.to_string(),
            sb.bar.close.to_string(),
            sb.position.as_i8().to_string(),
            opt(account.and_then(|a| a.net_value)),
            opt(account.and_then(|a| a.margin_ratio)),
            account.map(|a| a.liquidated).unwrap_or(false).to_string(),
            format!("{:.10}", sb.bar_return),
            format!("{:.10}", sb.equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting newer schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

/// Write `report.json`, `trades.csv` and `equity.csv` into `output_dir`.
///
/// Returns the written paths.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;

    let files = [
        ("report.json", export_json(result)?),
        ("trades.csv", export_trades_csv(&result.trades)?),
        ("equity.csv", export_equity_csv(&result.simulation)?),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, contents) in files {
        let path = output_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote artifact");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(eq: Option<f64>, error: Option<&str>) -> SweepRow {
        SweepRow {
            n: 300,
            m: 1.5,
            l: 0.02,
            equity_curve: eq,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn sweep_csv_has_header_and_rows() {
        let csv = export_sweep_csv(&[row(Some(1.25), None), row(None, Some("bad"))]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "n,m,l,equity_curve,error");
        assert_eq!(lines[1], "300,1.5,0.02,1.25,");
        assert_eq!(lines[2], "300,1.5,0.02,,bad");
    }

    #[test]
    fn empty_simulation_exports_header_only() {
        let csv = export_equity_csv(&Simulation::default()).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("candle_begin_time,"));
    }

    #[test]
    fn import_rejects_future_schema() {
        let err = import_json(r#"{"schema_version": 99}"#);
        assert!(err.is_err());
    }

    #[test]
    fn write_sweep_csv_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sweep.csv");
        write_sweep_csv(&[row(Some(1.0), None)], &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("equity_curve"));
    }
}
