//! Backtest runner — wires signals, positions, simulation, trades and stats.
//!
//! Two entry points:
//! - `run_strategy()`: the pipeline up to trade extraction. Used by the sweep,
//!   which only needs the final equity.
//! - `run_backtest()`: the pipeline plus performance statistics. Used by the
//!   report command.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bandrev_core::domain::{Bar, Trade};
use bandrev_core::engine::{
    extract_trades, resolve_positions, simulate, Blackout, ContractSpec, Simulation,
};
use bandrev_core::signals::{generate_signals, SignalParams};
use bandrev_core::ParamError;

use crate::data_loader::MarketContext;
use crate::metrics::{PerformanceReport, StatsError};

/// Errors from a single run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("invalid parameters: {0}")]
    Param(#[from] ParamError),
    #[error("statistics unavailable: {0}")]
    Stats(#[from] StatsError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Everything a run needs besides the signal parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSettings {
    pub contract: ContractSpec,
    pub blackout: Option<Blackout>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            contract: ContractSpec::default(),
            blackout: Some(Blackout::default()),
        }
    }
}

/// Pipeline output without statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub params: SignalParams,
    pub simulation: Simulation,
    pub trades: Vec<Trade>,
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub params: SignalParams,
    pub contract: ContractSpec,
    pub blackout: Option<Blackout>,
    pub dataset_hash: String,
    pub synthetic: bool,
    pub bar_count: usize,
    pub final_equity: f64,
    pub report: PerformanceReport,
    pub trades: Vec<Trade>,
    /// Per-bar detail; written to `equity.csv`, not to the JSON artifact.
    #[serde(skip)]
    pub simulation: Simulation,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Signals → positions → simulation → trades, for one parameter set.
pub fn run_strategy(
    bars: &[Bar],
    params: &SignalParams,
    settings: &RunSettings,
) -> Result<RunOutput, RunError> {
    let signals = generate_signals(bars, params)?;
    let positions = resolve_positions(bars, &signals, settings.blackout);
    let simulation = simulate(bars, &positions, &settings.contract)?;
    let trades = extract_trades(&simulation, Some(settings.contract.leverage));

    Ok(RunOutput {
        params: *params,
        simulation,
        trades,
    })
}

/// Full single run with statistics.
pub fn run_backtest(
    ctx: &MarketContext,
    params: &SignalParams,
    settings: &RunSettings,
) -> Result<BacktestResult, RunError> {
    let output = run_strategy(ctx.bars(), params, settings)?;
    let report = PerformanceReport::compute(&output.simulation, &output.trades)?;

    tracing::info!(
        n = params.n,
        m = params.m,
        l = params.l,
        trades = output.trades.len(),
        final_equity = output.simulation.final_equity(),
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        params: output.params,
        contract: settings.contract,
        blackout: settings.blackout,
        dataset_hash: ctx.dataset_hash.clone(),
        synthetic: ctx.synthetic,
        bar_count: ctx.len(),
        final_equity: output.simulation.final_equity(),
        report,
        trades: output.trades,
        simulation: output.simulation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::generate_synthetic_bars;
    use chrono::{Duration, NaiveDate};

    fn context(count: usize) -> MarketContext {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        MarketContext::new(
            generate_synthetic_bars("runner", start, count, Duration::minutes(15)),
            true,
        )
    }

    #[test]
    fn strategy_output_is_deterministic() {
        let ctx = context(3_000);
        let params = SignalParams::new(50, 1.5, 0.05).unwrap();
        let a = run_strategy(ctx.bars(), &params, &RunSettings::default()).unwrap();
        let b = run_strategy(ctx.bars(), &params, &RunSettings::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.simulation.len(), 3_000);
    }

    #[test]
    fn trades_carry_leverage() {
        let ctx = context(3_000);
        let params = SignalParams::new(30, 1.0, 0.05).unwrap();
        let out = run_strategy(ctx.bars(), &params, &RunSettings::default()).unwrap();
        assert!(out.trades.iter().all(|t| t.leverage == Some(3.0)));
    }

    #[test]
    fn backtest_without_trades_is_stats_error() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let bars: Vec<Bar> = (0..50)
            .map(|i| Bar {
                timestamp: start + Duration::minutes(15 * i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1.0,
            })
            .collect();
        let ctx = MarketContext::new(bars, false);
        let params = SignalParams::new(10, 2.0, 0.05).unwrap();
        let err = run_backtest(&ctx, &params, &RunSettings::default()).unwrap_err();
        assert_eq!(err, RunError::Stats(StatsError::NoTrades));
    }

    #[test]
    fn invalid_contract_is_param_error() {
        let ctx = context(100);
        let params = SignalParams::new(10, 2.0, 0.05).unwrap();
        let settings = RunSettings {
            contract: ContractSpec {
                leverage: 0.0,
                ..ContractSpec::default()
            },
            blackout: None,
        };
        let err = run_strategy(ctx.bars(), &params, &settings).unwrap_err();
        assert!(matches!(err, RunError::Param(ParamError::Contract { .. })));
    }
}
