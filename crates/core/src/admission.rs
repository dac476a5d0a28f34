//! Gas estimation as a pre-flight admission check.
//!
//! A candidate is only ever submitted after the node has simulated the exact
//! swap and returned a gas estimate. A simulation revert is an expected
//! outcome (the amount is too large for the pool right now), not an error.

use crate::context::{unix_now, SellContext};
use crate::sizer::TradeCandidate;
use crate::u256_math;
use alloy::primitives::U256;
use tracing::debug;
use unloader_chain::{GasParams, GatewayError};

/// Everything needed to submit one swap. Consumed by the executor.
#[derive(Debug, PartialEq, Eq)]
pub struct GasPlan {
    pub estimated_gas: u64,
    /// Estimate with the safety multiplier applied
    pub gas_limit: u64,
    pub params: GasParams,
    pub nonce: u64,
}

impl GasPlan {
    /// Upper bound on what the swap can cost in native currency.
    pub fn max_cost(&self) -> U256 {
        u256_math::gas_cost(self.gas_limit, self.params.effective_gas_price())
    }
}

/// Verdict on one candidate.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    Admitted(GasPlan),
    /// The simulation reverted.
    Rejected { reason: String },
    /// The swap would simulate, but the account cannot pay for the gas.
    Unaffordable { required: U256, available: U256 },
}

#[derive(Debug, Clone, Copy)]
pub struct GasAdmission {
    limit_multiplier: f64,
}

impl GasAdmission {
    pub fn new(limit_multiplier: f64) -> Self {
        Self { limit_multiplier }
    }

    fn gas_limit(&self, estimate: u64) -> u64 {
        let limit = ((estimate as f64) * self.limit_multiplier.max(1.0)).ceil();
        if limit >= u64::MAX as f64 {
            u64::MAX
        } else {
            (limit as u64).max(estimate)
        }
    }

    /// Simulate `candidate` and price it. Never broadcasts.
    ///
    /// `native_balance` is the account's current native balance, used for the
    /// affordability check.
    pub async fn admit(
        &self,
        ctx: &SellContext,
        candidate: &TradeCandidate,
        native_balance: U256,
    ) -> Result<Admission, GatewayError> {
        let tx = ctx.swap_request(candidate, unix_now());

        let estimated_gas = match ctx.gateway.estimate_gas(&tx).await {
            Ok(gas) => gas,
            Err(GatewayError::Rejected { code, message }) => {
                debug!(
                    amount = %candidate.amount_in,
                    code = code,
                    reason = %message,
                    "Gas estimation reverted"
                );
                return Ok(Admission::Rejected { reason: message });
            }
            Err(e) => return Err(e),
        };

        let fees = ctx.gateway.fee_suggestion().await?;
        let plan = GasPlan {
            estimated_gas,
            gas_limit: self.gas_limit(estimated_gas),
            params: ctx.gas.price(&fees),
            nonce: ctx.nonces.current(),
        };

        let required = plan.max_cost();
        if required > native_balance {
            return Ok(Admission::Unaffordable {
                required,
                available: native_balance,
            });
        }

        debug!(
            amount = %candidate.amount_in,
            estimated_gas = plan.estimated_gas,
            gas_limit = plan.gas_limit,
            max_fee_gwei = plan.params.effective_gas_price() / unloader_chain::GWEI,
            priority_fee_gwei = plan.params.priority_fee() / unloader_chain::GWEI,
            nonce = plan.nonce,
            "Candidate admitted"
        );

        Ok(Admission::Admitted(plan))
    }
}
