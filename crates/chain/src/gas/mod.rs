//! Fee pricing for approvals and swaps.
//!
//! A strategy turns the network's fee suggestion into the fee fields of a
//! transaction, bidding above the suggested priority fee by a fixed
//! escalation factor so our sells land ahead of competing transactions.
//!
//! ```rust,ignore
//! // 1.5x the suggested tip, at least 2 gwei; max fee 2 * base + tip, at most 300 gwei
//! let strategy = create_gas_strategy("Eip1559", 1.5, 2.0, 2.0, 300.0);
//! let params = strategy.price(&gateway.fee_suggestion().await?);
//! strategy.apply_gas(&mut tx, &params);
//! ```

mod eip1559;
mod legacy;

pub use eip1559::Eip1559GasStrategy;
pub use legacy::LegacyGasStrategy;

use alloy::rpc::types::TransactionRequest;
use serde::Serialize;
use std::fmt::Debug;

/// Wei per gwei.
pub const GWEI: u128 = 1_000_000_000;

/// Fee data reported by the network for the next block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeSuggestion {
    /// Base fee of the latest block (`None` on chains without EIP-1559).
    pub base_fee: Option<u128>,
    /// `eth_maxPriorityFeePerGas`, if the node supports it.
    pub priority_fee: Option<u128>,
    /// `eth_gasPrice`.
    pub gas_price: u128,
}

/// Gas parameters chosen for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GasParams {
    /// Type 0 transaction, one price for everything.
    Legacy { gas_price: u128 },
    /// Type 2 transaction. All values in wei.
    Eip1559 {
        max_fee_per_gas: u128,
        /// Maximum priority fee per gas in wei (already escalated).
        max_priority_fee_per_gas: u128,
        /// Base fee the plan was priced against.
        base_fee: u128,
    },
}

impl GasParams {
    /// Worst-case price per gas unit, used for affordability checks.
    pub fn effective_gas_price(&self) -> u128 {
        match self {
            GasParams::Legacy { gas_price } => *gas_price,
            GasParams::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }

    /// Priority fee (tip) per gas. For legacy pricing the whole gas price.
    pub fn priority_fee(&self) -> u128 {
        match self {
            GasParams::Legacy { gas_price } => *gas_price,
            GasParams::Eip1559 {
                max_priority_fee_per_gas,
                ..
            } => *max_priority_fee_per_gas,
        }
    }

    /// Base fee the plan assumed (zero for legacy pricing).
    pub fn base_fee(&self) -> u128 {
        match self {
            GasParams::Legacy { .. } => 0,
            GasParams::Eip1559 { base_fee, .. } => *base_fee,
        }
    }
}

/// Turns a [`FeeSuggestion`] into fee fields.
pub trait GasStrategy: Send + Sync + Debug {
    /// Price the next transaction.
    fn price(&self, suggestion: &FeeSuggestion) -> GasParams;

    /// Write `params` into the fee fields of `tx`.
    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams);

    fn strategy_name(&self) -> &'static str;
}

/// Multiply a fee by an escalation factor. Factors below 1.0 are treated as 1.0.
pub(crate) fn escalate(value: u128, factor: f64) -> u128 {
    let factor = if factor.is_finite() { factor.max(1.0) } else { 1.0 };
    ((value as f64) * factor) as u128
}

/// Build the strategy named by `pricing` ("Legacy", anything else is EIP-1559).
///
/// `min_priority_fee_gwei` doubles as the legacy gas price floor and
/// `max_fee_gwei` caps the price per gas for both models.
pub fn create_gas_strategy(
    pricing: &str,
    priority_escalation: f64,
    min_priority_fee_gwei: f64,
    base_fee_multiplier: f64,
    max_fee_gwei: f64,
) -> Box<dyn GasStrategy> {
    let min_priority_fee = (min_priority_fee_gwei * GWEI as f64) as u128;
    let max_fee = (max_fee_gwei * GWEI as f64) as u128;
    match pricing.to_ascii_lowercase().as_str() {
        "legacy" => Box::new(LegacyGasStrategy::new(
            min_priority_fee,
            max_fee,
            priority_escalation,
        )),
        _ => Box::new(
            Eip1559GasStrategy::new(min_priority_fee, priority_escalation)
                .with_base_fee_multiplier(base_fee_multiplier)
                .with_max_fee_cap(max_fee),
        ),
    }
}
