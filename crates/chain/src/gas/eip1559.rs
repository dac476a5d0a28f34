//! Type 2 pricing: escalated tip over a base fee with headroom.

use super::{escalate, FeeSuggestion, GasParams, GasStrategy};
use alloy::network::TransactionBuilder;
use alloy::rpc::types::TransactionRequest;

/// Base fee assumed when the latest block carries none.
const FALLBACK_BASE_FEE: u128 = 30_000_000_000;

/// The priority fee is the network suggestion multiplied by `priority_escalation`,
/// never below `min_priority_fee`. `max_fee_per_gas` leaves headroom for base fee
/// growth over the next blocks and is capped.
#[derive(Debug)]
pub struct Eip1559GasStrategy {
    /// Priority fee floor (tip) in wei.
    min_priority_fee: u128,
    /// Multiplier applied to the suggested priority fee.
    priority_escalation: f64,
    /// Multiplier for max_fee relative to base_fee (e.g., 2.0 = survive one full block of growth).
    base_fee_multiplier: f64,
    /// Ceiling on `max_fee_per_gas` in wei.
    max_fee_cap: u128,
}

impl Eip1559GasStrategy {
    /// Tip floor and escalation in wei; 2x base fee headroom, 300 gwei cap.
    pub fn new(min_priority_fee: u128, priority_escalation: f64) -> Self {
        Self {
            min_priority_fee,
            priority_escalation,
            base_fee_multiplier: 2.0,
            max_fee_cap: 300 * super::GWEI,
        }
    }

    pub fn with_max_fee_cap(mut self, cap: u128) -> Self {
        self.max_fee_cap = cap;
        self
    }

    pub fn with_base_fee_multiplier(mut self, multiplier: f64) -> Self {
        self.base_fee_multiplier = multiplier;
        self
    }

    fn max_fee(&self, base_fee: u128, priority_fee: u128) -> u128 {
        let headroom = ((base_fee as f64) * self.base_fee_multiplier) as u128;
        headroom.saturating_add(priority_fee).min(self.max_fee_cap)
    }
}

impl GasStrategy for Eip1559GasStrategy {
    fn price(&self, suggestion: &FeeSuggestion) -> GasParams {
        let base_fee = suggestion.base_fee.unwrap_or(FALLBACK_BASE_FEE);
        let suggested = suggestion.priority_fee.unwrap_or(self.min_priority_fee);

        let priority_fee = escalate(suggested, self.priority_escalation).max(self.min_priority_fee);
        let max_fee_per_gas = self.max_fee(base_fee, priority_fee);

        GasParams::Eip1559 {
            max_fee_per_gas,
            // A tip above the cap would make the transaction invalid
            max_priority_fee_per_gas: priority_fee.min(max_fee_per_gas),
            base_fee,
        }
    }

    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        match params {
            GasParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            } => {
                tx.set_max_fee_per_gas(*max_fee_per_gas);
                tx.set_max_priority_fee_per_gas(*max_priority_fee_per_gas);
            }
            GasParams::Legacy { gas_price } => {
                tx.set_max_fee_per_gas(*gas_price);
                tx.set_max_priority_fee_per_gas(self.min_priority_fee.min(*gas_price));
            }
        }
    }

    fn strategy_name(&self) -> &'static str {
        "EIP-1559"
    }
}
