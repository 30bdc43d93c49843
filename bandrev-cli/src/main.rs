//! BandRev CLI — parameter sweep and single-run report commands.
//!
//! Commands:
//! - `sweep` — run every (n, m, l) combination and write the sorted result file
//! - `report` — run one combination, print the labelled report, save artifacts

mod obs;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use bandrev_core::signals::SignalParams;
use bandrev_runner::export::{save_artifacts, write_sweep_csv};
use bandrev_runner::{
    load_market, render_report, run_backtest, run_sweep, BacktestConfig, LoadOptions,
    MarketContext,
};

#[derive(Parser)]
#[command(
    name = "bandrev",
    about = "BandRev — leveraged futures band mean-reversion backtester"
)]
struct Cli {
    /// Log filter (overridden by BANDREV_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the parameter grid and write the sorted result file.
    Sweep {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Worker threads. Defaults to [sweep] workers.
        #[arg(long)]
        workers: Option<usize>,

        /// Result file. Defaults to [sweep] output.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Use seeded synthetic bars instead of the candle file.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
    /// Run a single parameter combination and report its statistics.
    Report {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Band window length.
        #[arg(long)]
        n: usize,

        /// Band width multiplier.
        #[arg(long)]
        m: f64,

        /// Maximum relative deviation from the mean at entry.
        #[arg(long)]
        l: f64,

        /// Output directory for report.json, trades.csv, equity.csv.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Use seeded synthetic bars instead of the candle file.
        #[arg(long, default_value_t = false)]
        synthetic: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    obs::init_tracing(&cli.log_level, &cli.log_format).map_err(|e| anyhow!(e))?;

    match cli.command {
        Commands::Sweep {
            config,
            workers,
            output,
            synthetic,
        } => run_sweep_cmd(&config, workers, output, synthetic),
        Commands::Report {
            config,
            n,
            m,
            l,
            output_dir,
            synthetic,
        } => {
            let params = SignalParams::new(n, m, l).context("invalid strategy parameters")?;
            run_report_cmd(&config, &params, &output_dir, synthetic)
        }
    }
}

fn load(config: &BacktestConfig, synthetic: bool) -> Result<MarketContext> {
    let opts = LoadOptions {
        path: config.data.path.clone(),
        clean: config.data.clean_options()?,
        synthetic,
        ..LoadOptions::default()
    };
    load_market(&opts).context("failed to load market data")
}

fn run_sweep_cmd(
    config_path: &Path,
    workers: Option<usize>,
    output: Option<PathBuf>,
    synthetic: bool,
) -> Result<()> {
    let config = BacktestConfig::from_file(config_path)
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    tracing::debug!(config = %config_path.display(), "sweep command");
    let ctx = load(&config, synthetic)?;

    let workers = workers.unwrap_or(config.sweep.workers);
    let output = output.unwrap_or_else(|| config.sweep.output.clone());

    let rows = run_sweep(&ctx, &config.grid, &config.run_settings(), workers)
        .context("sweep failed to start")?;
    write_sweep_csv(&rows, &output)?;

    let failed = rows.iter().filter(|r| r.is_failed()).count();
    if let Some(best) = rows.first().filter(|r| !r.is_failed()) {
        println!(
            "Best: n={} m={} l={} equity_curve={:.4}",
            best.n,
            best.m,
            best.l,
            best.equity_curve.unwrap_or_default()
        );
    }
    println!(
        "{} combinations ({} failed) written to {}",
        rows.len(),
        failed,
        output.display()
    );
    Ok(())
}

fn run_report_cmd(
    config_path: &Path,
    params: &SignalParams,
    output_dir: &Path,
    synthetic: bool,
) -> Result<()> {
    let config = BacktestConfig::from_file(config_path)
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    let labels = config.label_map()?;
    tracing::debug!(config = %config_path.display(), "report command");
    let ctx = load(&config, synthetic)?;

    let result = run_backtest(&ctx, params, &config.run_settings())
        .with_context(|| format!("run n={} m={} l={} failed", params.n, params.m, params.l))?;

    if result.synthetic {
        println!("(synthetic data)");
    }
    print!("{}", render_report(&result.report, &labels));

    let written = save_artifacts(&result, output_dir)?;
    for path in written {
        println!("Saved: {}", path.display());
    }
    Ok(())
}
