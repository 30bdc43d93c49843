//! Trade extraction — regroups simulated bars into one record per position run.
//!
//! Post-processes the simulation after the bar loop completes. Pure function:
//! simulated bars (+ optional leverage tag) → trades in chronological order.

use super::state::{SimulatedBar, Simulation};
use crate::domain::Trade;

/// Extract one trade per position run.
///
/// Runs are keyed by their entry timestamp. `leverage` is copied onto every
/// trade when given.
pub fn extract_trades(sim: &Simulation, leverage: Option<f64>) -> Vec<Trade> {
    let mut trades = Vec::new();
    let mut run: Vec<&SimulatedBar> = Vec::new();

    for sb in &sim.bars {
        let entry = sb.account.map(|a| a.entry_time);
        let current = run.first().and_then(|b| b.account).map(|a| a.entry_time);

        if entry != current {
            if let Some(trade) = build_trade(&run, leverage) {
                trades.push(trade);
            }
            run.clear();
        }
        if entry.is_some() {
            run.push(sb);
        }
    }
    if let Some(trade) = build_trade(&run, leverage) {
        trades.push(trade);
    }

    trades
}

fn build_trade(run: &[&SimulatedBar], leverage: Option<f64>) -> Option<Trade> {
    let first = run.first()?;
    let last = run.last()?;
    let start = first.account?.entry_time;

    let change = run.iter().map(|b| 1.0 + b.bar_return).product::<f64>() - 1.0;
    let min_equity = run.iter().map(|b| b.equity).fold(f64::INFINITY, f64::min);

    Some(Trade {
        start,
        end: last.bar.timestamp,
        direction: first.position,
        leverage,
        entry_price: first.bar.open,
        exit_price: last.bar.close,
        bar_count: run.len(),
        change,
        end_equity: last.equity,
        min_equity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use crate::engine::{simulate, ContractSpec};
    use crate::indicators::{assert_approx, make_bars};

    use Direction::{Flat, Long, Short};

    #[test]
    fn flat_history_has_no_trades() {
        let bars = make_bars(&[100.0; 5]);
        let sim = simulate(&bars, &[Flat; 5], &ContractSpec::default()).unwrap();
        assert!(extract_trades(&sim, None).is_empty());
    }

    #[test]
    fn one_trade_per_run() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 101.0, 100.0, 99.0, 100.0]);
        let pos = [Flat, Long, Long, Short, Short, Flat, Long];
        let sim = simulate(&bars, &pos, &ContractSpec::default()).unwrap();
        let trades = extract_trades(&sim, Some(3.0));

        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].direction, Long);
        assert_eq!(trades[0].bar_count, 2);
        assert_eq!(trades[0].start, bars[1].timestamp);
        assert_eq!(trades[0].end, bars[2].timestamp);
        assert_eq!(trades[1].direction, Short);
        assert_eq!(trades[2].bar_count, 1);
        assert!(trades.iter().all(|t| t.leverage == Some(3.0)));
    }

    #[test]
    fn change_compounds_bar_returns() {
        let bars = make_bars(&[100.0, 101.0, 103.0, 102.0, 104.0]);
        let pos = [Flat, Long, Long, Long, Flat];
        let sim = simulate(&bars, &pos, &ContractSpec::default()).unwrap();
        let trades = extract_trades(&sim, None);

        let expected: f64 = sim.bars[1..4].iter().map(|b| 1.0 + b.bar_return).product();
        assert_approx(trades[0].change, expected - 1.0, 1e-12);
        assert_approx(trades[0].end_equity, sim.bars[3].equity, 1e-12);
        assert!(trades[0].min_equity <= trades[0].end_equity);
    }

    #[test]
    fn prices_are_raw_bar_prices() {
        let bars = make_bars(&[100.0, 101.0, 103.0, 102.0]);
        let pos = [Flat, Long, Long, Flat];
        let sim = simulate(&bars, &pos, &ContractSpec::default()).unwrap();
        let t = &extract_trades(&sim, None)[0];
        assert_eq!(t.entry_price, bars[1].open);
        assert_eq!(t.exit_price, bars[2].close);
    }
}
