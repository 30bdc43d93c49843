//! Futures equity simulator.
//!
//! Walks the bars once, cutting the position series into runs (maximal blocks
//! of one non-flat direction). Each run is accounted independently:
//!
//! - entry terms (contracts, fill, fee, cash) are fixed on the entry bar
//! - every bar is marked at close, the exit bar at the exit fill
//! - the intrabar worst price drives the margin ratio and liquidation
//! - per-bar returns chain net values; the entry bar is measured against
//!   the initial capital
//!
//! Undefined values are carried as `None`. Entry terms fall back to the most
//! recent defined terms; marks fall back to the next defined mark in the run.

use super::config::{ContractSpec, ExitPricing};
use super::state::{AccountState, SimulatedBar, Simulation};
use crate::domain::{Bar, Direction};
use crate::error::ParamError;

/// Terms fixed on the entry bar and held for the whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
struct EntryTerms {
    contracts: f64,
    price: f64,
    fee: f64,
    cash: f64,
}

impl EntryTerms {
    fn compute(open: f64, side: Direction, spec: &ContractSpec) -> Option<Self> {
        let open = valid_price(open)?;
        let contracts =
            (spec.initial_capital * spec.leverage / (spec.face_value * open)).floor();
        if !contracts.is_finite() {
            return None;
        }
        let price = open * (1.0 + side.sign() * spec.slippage);
        let fee = price * spec.face_value * contracts * spec.fee_rate;
        Some(Self {
            contracts,
            price,
            fee,
            cash: spec.initial_capital - fee,
        })
    }

    fn pnl(&self, price: f64, side: Direction, face_value: f64) -> f64 {
        face_value * self.contracts * (price - self.price) * side.sign()
    }
}

#[derive(Debug, Clone, Copy)]
struct ExitFill {
    price: Option<f64>,
    fee: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
struct Marks {
    profit: Option<f64>,
    worst_price: Option<f64>,
    worst_profit: Option<f64>,
}

/// Simulate the account over `bars` holding `positions`.
///
/// Both slices are read up to the shorter length.
pub fn simulate(
    bars: &[Bar],
    positions: &[Direction],
    spec: &ContractSpec,
) -> Result<Simulation, ParamError> {
    spec.validate()?;

    let len = bars.len().min(positions.len());
    let (bars, positions) = (&bars[..len], &positions[..len]);

    let mut out = Vec::with_capacity(len);
    let mut carried: Option<EntryTerms> = None;
    let mut equity = 1.0;
    let mut start = 0;

    while start < len {
        let side = positions[start];
        if side.is_flat() {
            out.push(SimulatedBar {
                bar: bars[start],
                position: side,
                account: None,
                bar_return: 0.0,
                equity,
            });
            start += 1;
            continue;
        }

        let end = run_end(positions, start);
        let run = &bars[start..=end];
        let accounts = simulate_run(run, bars.get(end + 1), side, spec, &mut carried);
        let returns = run_returns(&accounts, spec.initial_capital);

        for ((bar, account), bar_return) in run.iter().zip(accounts).zip(returns) {
            equity *= 1.0 + bar_return;
            out.push(SimulatedBar {
                bar: *bar,
                position: side,
                account: Some(account),
                bar_return,
                equity,
            });
        }
        start = end + 1;
    }

    Ok(Simulation { bars: out })
}

/// Last index of the run starting at `start`.
fn run_end(positions: &[Direction], start: usize) -> usize {
    let side = positions[start];
    let mut end = start;
    while end + 1 < positions.len() && positions[end + 1] == side {
        end += 1;
    }
    end
}

fn simulate_run(
    run: &[Bar],
    next: Option<&Bar>,
    side: Direction,
    spec: &ContractSpec,
    carried: &mut Option<EntryTerms>,
) -> Vec<AccountState> {
    let entry_bar = &run[0];
    let terms = match EntryTerms::compute(entry_bar.open, side, spec) {
        Some(t) => {
            *carried = Some(t);
            Some(t)
        }
        None => {
            tracing::debug!(
                entry = %entry_bar.timestamp,
                open = entry_bar.open,
                reused = carried.is_some(),
                "entry terms undefined"
            );
            *carried
        }
    };

    let last = run.len() - 1;
    let exit = exit_fill(&run[last], next, side, terms, spec);

    let mut marks: Vec<Marks> = run
        .iter()
        .enumerate()
        .map(|(k, bar)| mark_bar(bar, side, terms, (k == last).then_some(&exit), spec))
        .collect();
    backfill_marks(&mut marks);

    let threshold = spec.liquidation_threshold();
    let mut liquidated = false;

    run.iter()
        .zip(marks)
        .enumerate()
        .map(|(k, (bar, m))| {
            let is_exit = k == last;
            let mut cash = terms.map(|t| t.cash);
            if is_exit {
                cash = cash.zip(exit.fee).map(|(c, fee)| c - fee);
            }

            let net = cash.zip(m.profit).map(|(c, p)| c + p);
            let worst_net = cash.zip(m.worst_profit).map(|(c, p)| c + p);
            let margin_ratio = match (worst_net, terms, m.worst_price) {
                (Some(w), Some(t), Some(p)) => {
                    let exposure = spec.face_value * t.contracts * p;
                    Some(w / exposure).filter(|r| r.is_finite())
                }
                _ => None,
            };

            let breach = margin_ratio
                .map(|r| spec.liquidation_boundary.breached(r, threshold))
                .unwrap_or(false)
                || net.map(|v| v < 0.0).unwrap_or(false);
            if breach && !liquidated {
                tracing::debug!(
                    entry = %entry_bar.timestamp,
                    bar = %bar.timestamp,
                    margin_ratio = margin_ratio.unwrap_or(f64::NAN),
                    "run liquidated"
                );
            }
            liquidated |= breach;

            AccountState {
                entry_time: entry_bar.timestamp,
                contracts: terms.map(|t| t.contracts),
                entry_price: terms.map(|t| t.price),
                entry_fee: terms.map(|t| t.fee),
                cash,
                exit_price: if is_exit { exit.price } else { None },
                exit_fee: if is_exit { exit.fee } else { None },
                profit: m.profit,
                worst_price: m.worst_price,
                worst_profit: m.worst_profit,
                net_value: if liquidated { Some(0.0) } else { net },
                worst_net_value: worst_net,
                margin_ratio,
                liquidated,
            }
        })
        .collect()
}

fn exit_fill(
    bar: &Bar,
    next: Option<&Bar>,
    side: Direction,
    terms: Option<EntryTerms>,
    spec: &ContractSpec,
) -> ExitFill {
    let reference = match spec.exit_pricing {
        ExitPricing::NextOpen => next
            .and_then(|b| valid_price(b.open))
            .or_else(|| valid_price(bar.close)),
        ExitPricing::CloseMark => valid_price(bar.close),
    };
    let price = reference.map(|p| p * (1.0 - side.sign() * spec.slippage));
    let fee = price
        .zip(terms)
        .map(|(p, t)| p * spec.face_value * t.contracts * spec.fee_rate);
    ExitFill { price, fee }
}

fn mark_bar(
    bar: &Bar,
    side: Direction,
    terms: Option<EntryTerms>,
    exit: Option<&ExitFill>,
    spec: &ContractSpec,
) -> Marks {
    let fill_marked = exit.filter(|_| spec.exit_pricing == ExitPricing::NextOpen);

    let mark_price = match fill_marked {
        Some(e) => e.price,
        None => finite(bar.close),
    };

    let intrabar = match side {
        Direction::Long => finite(bar.low),
        Direction::Short => finite(bar.high),
        Direction::Flat => None,
    };
    let worst_price = match fill_marked {
        Some(e) => worse_of(intrabar, e.price, side),
        None => intrabar,
    };

    let pnl = |price: Option<f64>| {
        price
            .zip(terms)
            .map(|(p, t)| t.pnl(p, side, spec.face_value))
    };

    Marks {
        profit: pnl(mark_price),
        worst_price,
        worst_profit: pnl(worst_price),
    }
}

/// Undefined marks take the next defined value later in the run.
fn backfill_marks(marks: &mut [Marks]) {
    for k in (0..marks.len().saturating_sub(1)).rev() {
        let next = marks[k + 1];
        let m = &mut marks[k];
        m.profit = m.profit.or(next.profit);
        m.worst_price = m.worst_price.or(next.worst_price);
        m.worst_profit = m.worst_profit.or(next.worst_profit);
    }
}

/// Per-bar returns for one run.
///
/// The entry bar is measured against the initial capital. Later bars chain off
/// the last defined net value; a zero or missing reference gives 0.
fn run_returns(accounts: &[AccountState], initial_capital: f64) -> Vec<f64> {
    let mut reference: Option<f64> = None;
    accounts
        .iter()
        .enumerate()
        .map(|(k, a)| {
            let r = match (k, a.net_value, reference) {
                (0, Some(v), _) => v / initial_capital - 1.0,
                (_, Some(v), Some(p)) if p != 0.0 => v / p - 1.0,
                _ => 0.0,
            };
            if a.net_value.is_some() {
                reference = a.net_value;
            }
            if r.is_finite() {
                r
            } else {
                0.0
            }
        })
        .collect()
}

fn worse_of(intrabar: Option<f64>, fill: Option<f64>, side: Direction) -> Option<f64> {
    match (intrabar, fill) {
        (Some(a), Some(b)) => Some(match side {
            Direction::Short => a.max(b),
            _ => a.min(b),
        }),
        (a, b) => a.or(b),
    }
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

fn valid_price(x: f64) -> Option<f64> {
    (x.is_finite() && x > 0.0).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;
    use chrono::{Duration, NaiveDate};

    use Direction::{Flat, Long, Short};

    fn bars(ohlc: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        ohlc.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                timestamp: base + Duration::minutes(15 * i as i64),
                open,
                high,
                low,
                close,
                volume: 1.0,
            })
            .collect()
    }

    #[test]
    fn entry_terms_truncate_contracts() {
        let spec = ContractSpec::default();
        let t = EntryTerms::compute(101.0, Long, &spec).unwrap();
        // 30000 / 1.01 = 29702.97 -> 29702
        assert_eq!(t.contracts, 29_702.0);
        assert_approx(t.price, 101.101, 1e-9);
    }

    #[test]
    fn short_entry_fills_below_open() {
        let spec = ContractSpec::default();
        let t = EntryTerms::compute(100.0, Short, &spec).unwrap();
        assert_approx(t.price, 99.9, 1e-9);
    }

    #[test]
    fn entry_terms_undefined_for_bad_open() {
        let spec = ContractSpec::default();
        assert!(EntryTerms::compute(0.0, Long, &spec).is_none());
        assert!(EntryTerms::compute(f64::NAN, Long, &spec).is_none());
    }

    #[test]
    fn run_end_stops_at_direction_change() {
        let pos = vec![Long, Long, Short, Short, Flat];
        assert_eq!(run_end(&pos, 0), 1);
        assert_eq!(run_end(&pos, 2), 3);
    }

    #[test]
    fn direct_reversal_is_two_runs() {
        let b = bars(&[
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
        ]);
        let sim = simulate(&b, &[Flat, Long, Short, Flat], &ContractSpec::default()).unwrap();
        let a1 = sim.bars[1].account.unwrap();
        let a2 = sim.bars[2].account.unwrap();
        assert_ne!(a1.entry_time, a2.entry_time);
        assert!(a1.exit_price.is_some());
        assert!(a2.exit_price.is_some());
        assert!(sim.bars[1].is_entry());
        assert!(sim.bars[2].is_entry());
    }

    #[test]
    fn run_to_end_of_history_exits_at_close() {
        let b = bars(&[(100.0, 101.0, 99.0, 100.0), (100.0, 101.0, 99.0, 100.5)]);
        let spec = ContractSpec::default();
        let sim = simulate(&b, &[Flat, Long], &spec).unwrap();
        let a = sim.bars[1].account.unwrap();
        assert_approx(a.exit_price.unwrap(), 100.5 * (1.0 - spec.slippage), 1e-9);
    }

    #[test]
    fn undefined_entry_reuses_previous_terms() {
        let b = bars(&[
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (0.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
        ]);
        let sim = simulate(&b, &[Flat, Long, Flat, Long, Flat], &ContractSpec::default()).unwrap();
        let first = sim.bars[1].account.unwrap();
        let second = sim.bars[3].account.unwrap();
        assert_eq!(first.contracts, second.contracts);
        assert_eq!(first.entry_price, second.entry_price);
    }

    #[test]
    fn undefined_entry_without_history_is_zero_return() {
        let b = bars(&[(0.0, 1.0, 0.0, 0.0), (0.0, 1.0, 0.0, 0.0)]);
        let sim = simulate(&b, &[Long, Long], &ContractSpec::default()).unwrap();
        for sb in &sim.bars {
            let a = sb.account.unwrap();
            assert!(a.contracts.is_none());
            assert!(a.net_value.is_none());
            assert_eq!(sb.bar_return, 0.0);
            assert_eq!(sb.equity, 1.0);
        }
    }

    #[test]
    fn nan_close_backfills_from_later_bar() {
        let b = bars(&[
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, f64::NAN),
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
        ]);
        let sim = simulate(&b, &[Flat, Long, Long, Long, Flat], &ContractSpec::default()).unwrap();
        let hole = sim.bars[2].account.unwrap();
        let after = sim.bars[3].account.unwrap();
        assert_eq!(hole.profit, after.profit);
    }

    #[test]
    fn close_mark_uses_close_on_exit_bar() {
        let b = bars(&[
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 101.0, 99.0, 100.0),
            (100.0, 103.0, 99.0, 102.0),
            (110.0, 111.0, 109.0, 110.0),
        ]);
        let spec = ContractSpec {
            exit_pricing: ExitPricing::CloseMark,
            ..ContractSpec::default()
        };
        let sim = simulate(&b, &[Flat, Long, Long, Flat], &spec).unwrap();
        let exit = sim.bars[2].account.unwrap();
        let t = EntryTerms::compute(100.0, Long, &spec).unwrap();
        assert_approx(exit.profit.unwrap(), t.pnl(102.0, Long, spec.face_value), 1e-9);
        assert_approx(exit.exit_price.unwrap(), 102.0 * 0.999, 1e-9);
        assert_eq!(exit.worst_price, Some(99.0));
    }

    #[test]
    fn mismatched_lengths_truncate() {
        let b = bars(&[(100.0, 101.0, 99.0, 100.0); 4]);
        let sim = simulate(&b, &[Flat, Flat], &ContractSpec::default()).unwrap();
        assert_eq!(sim.len(), 2);
    }

    #[test]
    fn invalid_spec_is_rejected() {
        let spec = ContractSpec {
            face_value: 0.0,
            ..ContractSpec::default()
        };
        assert!(simulate(&[], &[], &spec).is_err());
    }
}
