//! Contract and account configuration for the equity simulator.

use crate::error::ParamError;
use serde::{Deserialize, Serialize};

/// How the exit bar of a run is priced and marked.
///
/// Two accounting variants existed for this strategy; they share entry/exit
/// detection and differ only on the exit bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPricing {
    /// Fill at the next bar's open (current close when there is no next bar),
    /// mark the exit bar at that fill, and include it in the worst-price check.
    #[default]
    NextOpen,
    /// Fill at the exit bar's own close. Profit is marked at the unadjusted
    /// close; only the exit fee sees slippage. Worst price is low/high only.
    CloseMark,
}

/// Treatment of a margin ratio exactly equal to the liquidation threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidationBoundary {
    /// Liquidate only when the ratio is strictly below the threshold.
    #[default]
    Strict,
    /// Liquidate when the ratio is at or below the threshold.
    Inclusive,
}

impl LiquidationBoundary {
    pub fn breached(self, margin_ratio: f64, threshold: f64) -> bool {
        match self {
            LiquidationBoundary::Strict => margin_ratio < threshold,
            LiquidationBoundary::Inclusive => margin_ratio <= threshold,
        }
    }
}

/// Leverage, contract and cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractSpec {
    pub leverage: f64,
    /// Notional represented by one contract, in units of the underlying.
    pub face_value: f64,
    pub fee_rate: f64,
    pub slippage: f64,
    pub maintenance_margin_ratio: f64,
    /// Capital committed at the start of every position run.
    pub initial_capital: f64,
    pub exit_pricing: ExitPricing,
    pub liquidation_boundary: LiquidationBoundary,
}

impl Default for ContractSpec {
    fn default() -> Self {
        Self {
            leverage: 3.0,
            face_value: 0.01,
            fee_rate: 5.0 / 10_000.0,
            slippage: 1.0 / 1_000.0,
            maintenance_margin_ratio: 1.0 / 100.0,
            initial_capital: 10_000.0,
            exit_pricing: ExitPricing::NextOpen,
            liquidation_boundary: LiquidationBoundary::Strict,
        }
    }
}

impl ContractSpec {
    /// Margin ratio below which a run is closed out.
    pub fn liquidation_threshold(&self) -> f64 {
        self.maintenance_margin_ratio + self.fee_rate
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        positive("leverage", self.leverage)?;
        positive("face_value", self.face_value)?;
        positive("initial_capital", self.initial_capital)?;
        unit_rate("fee_rate", self.fee_rate)?;
        unit_rate("slippage", self.slippage)?;
        unit_rate("maintenance_margin_ratio", self.maintenance_margin_ratio)?;
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ParamError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ParamError::Contract { field, value })
    }
}

fn unit_rate(field: &'static str, value: f64) -> Result<(), ParamError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParamError::Contract { field, value })
    }
}
