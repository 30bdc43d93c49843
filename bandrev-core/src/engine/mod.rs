//! Engine — lagged positions, the futures equity simulator and trade extraction.
//!
//! Pipeline per parameter combination:
//! 1. `resolve_positions` — signal shifted by one bar, settlement blackout applied
//! 2. `simulate` — run detection, entry terms, marking, liquidation, returns
//! 3. `extract_trades` — one record per position run
//!
//! Everything is a pure function of its inputs; identical inputs give
//! bit-identical outputs.

pub mod accounting;
pub mod config;
pub mod position;
pub mod state;
pub mod trade_extraction;

pub use accounting::simulate;
pub use config::{ContractSpec, ExitPricing, LiquidationBoundary};
pub use position::{resolve_positions, Blackout, Position};
pub use state::{AccountState, SimulatedBar, Simulation};
pub use trade_extraction::extract_trades;
