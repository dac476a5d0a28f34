//! Single `gasPrice` pricing for networks without a base fee market.

use super::{escalate, FeeSuggestion, GasParams, GasStrategy};
use alloy::network::TransactionBuilder;
use alloy::rpc::types::TransactionRequest;

/// Uses a single `gas_price` field: the network gas price multiplied by the
/// escalation factor, bounded below by `default_gas_price` and above by `max_gas_price`.
#[derive(Debug)]
pub struct LegacyGasStrategy {
    /// Gas price floor in wei (also used when the node reports zero).
    default_gas_price: u128,
    /// Ceiling in wei.
    max_gas_price: u128,
    /// Multiplier over the network gas price.
    escalation: f64,
}

impl LegacyGasStrategy {
    pub fn new(default_gas_price: u128, max_gas_price: u128, escalation: f64) -> Self {
        Self {
            default_gas_price,
            max_gas_price,
            escalation,
        }
    }
}

impl GasStrategy for LegacyGasStrategy {
    fn price(&self, suggestion: &FeeSuggestion) -> GasParams {
        let gas_price = escalate(suggestion.gas_price, self.escalation)
            .max(self.default_gas_price)
            .min(self.max_gas_price);

        GasParams::Legacy { gas_price }
    }

    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        match params {
            GasParams::Legacy { gas_price } => tx.set_gas_price(*gas_price),
            // A 1559 plan on a legacy chain pays its cap
            GasParams::Eip1559 { max_fee_per_gas, .. } => tx.set_gas_price(*max_fee_per_gas),
        }
    }

    fn strategy_name(&self) -> &'static str {
        "Legacy"
    }
}
