//! Router allowance gate.
//!
//! Before any swap can be estimated the router must be allowed to pull the
//! candidate amount. When it is not, the guard approves `U256::MAX` once, so
//! every later cycle finds the allowance sufficient.
//!
//! An approval that was broadcast but not confirmed in time is remembered.
//! While the node still holds it, later checks wait for it instead of
//! submitting a second one.

use crate::context::SellContext;
use crate::error::CycleError;
use alloy::network::TransactionBuilder;
use alloy::primitives::{B256, U256};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Result of an allowance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowanceStatus {
    /// Allowance already covers the amount; nothing submitted.
    Sufficient,
    /// An approval was mined.
    Approved { tx_hash: B256 },
    /// An earlier approval is broadcast but not mined yet; nothing submitted.
    Pending { tx_hash: B256 },
}

/// Approval that timed out waiting for its receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingApproval {
    tx_hash: B256,
    nonce: u64,
}

#[derive(Debug)]
pub struct AllowanceGuard {
    approval_gas_limit: u64,
    confirm_timeout: Duration,
    /// Approve 0 first for tokens that refuse non-zero to non-zero changes
    reset_first: bool,
    pending: Mutex<Option<PendingApproval>>,
}

impl AllowanceGuard {
    pub fn new(approval_gas_limit: u64, confirm_timeout: Duration, reset_first: bool) -> Self {
        Self {
            approval_gas_limit,
            confirm_timeout,
            reset_first,
            pending: Mutex::new(None),
        }
    }

    /// Make sure the router may spend at least `amount` of the token.
    #[instrument(skip(self, ctx, amount), fields(token = %ctx.token.symbol, amount = %amount))]
    pub async fn ensure(
        &self,
        ctx: &SellContext,
        amount: U256,
    ) -> Result<AllowanceStatus, CycleError> {
        let mut current = self.current(ctx).await?;
        if current >= amount {
            self.pending.lock().take();
            return Ok(AllowanceStatus::Sufficient);
        }

        let pending = *self.pending.lock();
        if let Some(pending) = pending {
            if let Some(status) = self.settle(ctx, pending).await? {
                return Ok(status);
            }
            current = self.current(ctx).await?;
            if current >= amount {
                return Ok(AllowanceStatus::Approved {
                    tx_hash: pending.tx_hash,
                });
            }
        }

        info!(
            current = %current,
            router = %ctx.router,
            "Allowance insufficient, approving router"
        );

        if self.reset_first && !current.is_zero() {
            self.approve(ctx, U256::ZERO).await?;
        }
        let tx_hash = self.approve(ctx, U256::MAX).await?;

        Ok(AllowanceStatus::Approved { tx_hash })
    }

    async fn current(&self, ctx: &SellContext) -> Result<U256, CycleError> {
        Ok(ctx
            .gateway
            .allowance(ctx.token.address, ctx.account, ctx.router)
            .await?)
    }

    /// Resolve an approval left unconfirmed by an earlier check. Returns
    /// `Some` while it is still in flight, `None` once it was mined or dropped.
    async fn settle(
        &self,
        ctx: &SellContext,
        pending: PendingApproval,
    ) -> Result<Option<AllowanceStatus>, CycleError> {
        if let Some(receipt) = ctx.gateway.transaction_receipt(pending.tx_hash).await? {
            self.pending.lock().take();
            if !receipt.success {
                warn!(
                    tx_hash = %receipt.tx_hash,
                    link = %ctx.explorer.tx_url(receipt.tx_hash),
                    "Pending approval reverted"
                );
                return Err(CycleError::ApprovalReverted {
                    tx_hash: receipt.tx_hash,
                });
            }
            info!(
                tx_hash = %receipt.tx_hash,
                block = receipt.block_number.unwrap_or(0),
                "Pending approval mined"
            );
            return Ok(None);
        }

        // The pending count only moves past the approval's nonce while the node holds it
        let account_nonce = ctx.gateway.nonce().await?;
        if account_nonce > pending.nonce {
            info!(
                tx_hash = %pending.tx_hash,
                nonce = pending.nonce,
                "Approval still pending, not approving again"
            );
            return Ok(Some(AllowanceStatus::Pending {
                tx_hash: pending.tx_hash,
            }));
        }

        warn!(
            tx_hash = %pending.tx_hash,
            nonce = pending.nonce,
            "Pending approval was dropped"
        );
        self.pending.lock().take();
        Ok(None)
    }

    async fn approve(&self, ctx: &SellContext, amount: U256) -> Result<B256, CycleError> {
        let fees = ctx.gateway.fee_suggestion().await?;
        let params = ctx.gas.price(&fees);

        let nonce = ctx.nonces.next();
        let mut tx = ctx
            .approve_request(amount)
            .with_nonce(nonce)
            .with_gas_limit(self.approval_gas_limit);
        ctx.gas.apply_gas(&mut tx, &params);

        let receipt = match ctx.gateway.submit(tx, self.confirm_timeout).await {
            Ok(receipt) => receipt,
            Err(e) => {
                if let Some(tx_hash) = e.tx_hash() {
                    warn!(
                        tx_hash = %tx_hash,
                        nonce = nonce,
                        link = %ctx.explorer.tx_url(tx_hash),
                        "Approval broadcast but unconfirmed"
                    );
                    *self.pending.lock() = Some(PendingApproval { tx_hash, nonce });
                }
                return Err(e.into());
            }
        };
        if !receipt.success {
            warn!(
                tx_hash = %receipt.tx_hash,
                link = %ctx.explorer.tx_url(receipt.tx_hash),
                "Approval reverted"
            );
            return Err(CycleError::ApprovalReverted {
                tx_hash: receipt.tx_hash,
            });
        }

        info!(
            tx_hash = %receipt.tx_hash,
            amount = %amount,
            block = receipt.block_number.unwrap_or(0),
            link = %ctx.explorer.tx_url(receipt.tx_hash),
            "Approval confirmed"
        );
        Ok(receipt.tx_hash)
    }
}
