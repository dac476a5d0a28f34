//! Swap execution for admitted candidates.
//!
//! Builds the router call from the candidate and its gas plan, submits it
//! through the gateway and classifies the result. Expected failures come back
//! as [`SubmissionOutcome`] values.

use crate::admission::GasPlan;
use crate::context::{unix_now, SellContext};
use crate::sizer::TradeCandidate;
use alloy::network::TransactionBuilder;
use alloy::primitives::B256;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Terminal result for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Mined with status 1.
    Confirmed {
        tx_hash: B256,
        block_number: Option<u64>,
        gas_used: u64,
    },
    /// Admitted by simulation but reverted on chain.
    Reverted { tx_hash: B256, gas_used: u64 },
    /// Gas estimation reverted; nothing was submitted.
    NotAdmitted { reason: String },
    /// The gateway failed. `tx_hash` is set when the transaction was broadcast.
    GatewayError {
        message: String,
        tx_hash: Option<B256>,
    },
    /// Fully built but deliberately not broadcast.
    DryRun { gas_limit: u64 },
}

impl SubmissionOutcome {
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            SubmissionOutcome::Confirmed { tx_hash, .. }
            | SubmissionOutcome::Reverted { tx_hash, .. } => Some(*tx_hash),
            SubmissionOutcome::GatewayError { tx_hash, .. } => *tx_hash,
            SubmissionOutcome::NotAdmitted { .. } | SubmissionOutcome::DryRun { .. } => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, SubmissionOutcome::Confirmed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct SwapExecutor {
    confirm_timeout: Duration,
    dry_run: bool,
}

impl SwapExecutor {
    pub fn new(confirm_timeout: Duration, dry_run: bool) -> Self {
        Self {
            confirm_timeout,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Submit the swap for `candidate` using `plan`.
    #[instrument(skip_all, fields(amount = %candidate.amount_in, nonce = plan.nonce))]
    pub async fn execute(
        &self,
        ctx: &SellContext,
        candidate: &TradeCandidate,
        plan: GasPlan,
    ) -> SubmissionOutcome {
        let mut tx = ctx
            .swap_request(candidate, unix_now())
            .with_nonce(plan.nonce)
            .with_gas_limit(plan.gas_limit);
        ctx.gas.apply_gas(&mut tx, &plan.params);

        if self.dry_run {
            info!(
                amount = %ctx.token.display(candidate.amount_in),
                gas_limit = plan.gas_limit,
                max_cost_wei = %plan.max_cost(),
                entry_point = ctx.swap.entry_point.name(),
                "Dry run: swap built, not broadcasting"
            );
            return SubmissionOutcome::DryRun {
                gas_limit: plan.gas_limit,
            };
        }

        info!(
            amount = %ctx.token.display(candidate.amount_in),
            gas_limit = plan.gas_limit,
            gas_strategy = ctx.gas.strategy_name(),
            max_fee_gwei = plan.params.effective_gas_price() / unloader_chain::GWEI,
            "Submitting swap"
        );

        let start = Instant::now();
        let result = ctx.gateway.submit(tx, self.confirm_timeout).await;
        let elapsed_ms = start.elapsed().as_millis();

        match result {
            Ok(receipt) => {
                ctx.nonces.sync(plan.nonce + 1);
                let link = ctx.explorer.tx_url(receipt.tx_hash);
                if receipt.success {
                    info!(
                        tx_hash = %receipt.tx_hash,
                        block = receipt.block_number.unwrap_or(0),
                        gas_used = receipt.gas_used,
                        elapsed_ms = elapsed_ms,
                        link = %link,
                        "Swap confirmed"
                    );
                    SubmissionOutcome::Confirmed {
                        tx_hash: receipt.tx_hash,
                        block_number: receipt.block_number,
                        gas_used: receipt.gas_used,
                    }
                } else {
                    warn!(
                        tx_hash = %receipt.tx_hash,
                        gas_used = receipt.gas_used,
                        link = %link,
                        "Swap reverted on chain"
                    );
                    SubmissionOutcome::Reverted {
                        tx_hash: receipt.tx_hash,
                        gas_used: receipt.gas_used,
                    }
                }
            }
            Err(e) => {
                let tx_hash = e.tx_hash();
                if tx_hash.is_some() {
                    // Broadcast happened; the nonce is spent even without a receipt
                    ctx.nonces.sync(plan.nonce + 1);
                }
                warn!(
                    error = %e,
                    tx_hash = ?tx_hash,
                    elapsed_ms = elapsed_ms,
                    "Swap submission failed"
                );
                SubmissionOutcome::GatewayError {
                    message: e.to_string(),
                    tx_hash,
                }
            }
        }
    }
}
