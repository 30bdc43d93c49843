//! BandRev Runner — data loading, single runs, statistics, sweeps, reporting.
//!
//! This crate builds on `bandrev-core` to provide:
//! - TOML configuration with per-section defaults
//! - Candle CSV loading, cleaning and a seeded synthetic fallback
//! - Single-run pipeline with performance statistics
//! - Parallel (n, m, l) parameter sweep with per-task failure isolation
//! - Label-mapped report rendering and JSON/CSV artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod labels;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError};
pub use data_loader::{load_market, LoadError, LoadOptions, MarketContext};
pub use labels::{render_report, LabelMap, Locale, ReportField};
pub use metrics::{PerformanceReport, StatsError};
pub use runner::{run_backtest, run_strategy, BacktestResult, RunError, RunSettings};
pub use sweep::{run_sweep, ParamGrid, SweepRow};
