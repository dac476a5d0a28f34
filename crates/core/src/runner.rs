//! Sell loop orchestration.
//!
//! Each tick reads the wallet, makes sure the router is approved, then walks
//! the decay schedule from the largest candidate down until one is admitted
//! and executed. Ticks repeat until the balance is gone, the run is cancelled
//! or (in dry-run mode) after the first cycle.

use alloy::primitives::U256;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::admission::{Admission, GasAdmission};
use crate::allowance::{AllowanceGuard, AllowanceStatus};
use crate::config::UnloaderConfig;
use crate::context::SellContext;
use crate::error::{ConfigError, CycleError};
use crate::executor::{SubmissionOutcome, SwapExecutor};
use crate::journal::{AttemptRecord, CycleEnd, CycleReport, Journal, WalletSnapshot};
use crate::sizer::{TradeCandidate, TradeSizer};
use crate::u256_math;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Waiting for the next tick.
    Idle,
    /// Reading the wallet and allowance.
    Checking,
    /// Estimating a candidate.
    Admitting,
    /// Submitting an admitted candidate.
    Executing,
    /// Cancelled, or a dry run completed.
    Stopped,
    /// Nothing left to sell.
    Finished,
}

/// Loop timing and policy.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub poll_interval: Duration,
    pub max_backoff: Duration,
    /// Consecutive failed cycles before logging escalates to warn
    pub max_transient_retries: u32,
    pub candidate_pause: Duration,
    pub min_amount_out: U256,
}

impl RunnerConfig {
    pub fn from_config(config: &UnloaderConfig, min_amount_out: U256) -> Self {
        Self {
            poll_interval: config.timing.poll_interval(),
            max_backoff: config.timing.max_backoff(),
            max_transient_retries: config.timing.max_transient_retries,
            candidate_pause: config.sizing.candidate_pause(),
            min_amount_out,
        }
    }
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    /// Total amount confirmed sold
    pub sold: U256,
    pub state: RunState,
    pub last_end: Option<CycleEnd>,
}

pub struct Runner {
    ctx: Arc<SellContext>,
    sizer: TradeSizer,
    allowance: AllowanceGuard,
    admission: GasAdmission,
    executor: SwapExecutor,
    journal: Arc<Journal>,
    config: RunnerConfig,
    state: RunState,
    cycle: u64,
    /// Candidate whose submission failed at the gateway; next cycle starts here
    pending_retry: Option<U256>,
    consecutive_failures: u32,
    sold: U256,
}

impl Runner {
    pub fn new(
        ctx: Arc<SellContext>,
        sizer: TradeSizer,
        allowance: AllowanceGuard,
        admission: GasAdmission,
        executor: SwapExecutor,
        journal: Arc<Journal>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            ctx,
            sizer,
            allowance,
            admission,
            executor,
            journal,
            config,
            state: RunState::Idle,
            cycle: 0,
            pending_retry: None,
            consecutive_failures: 0,
            sold: U256::ZERO,
        }
    }

    /// Wire every component from loaded configuration. The floor is given in
    /// whole tokens and converted with the token's decimals.
    pub fn from_config(
        ctx: Arc<SellContext>,
        config: &UnloaderConfig,
        min_amount_out: U256,
        journal: Arc<Journal>,
    ) -> Result<Self, ConfigError> {
        let floor = u256_math::parse_token_amount(&config.sizing.floor, ctx.token.decimals)
            .ok_or_else(|| ConfigError::Invalid {
                field: "sizing.floor",
                message: format!(
                    "{:?} is not an amount with at most {} decimals",
                    config.sizing.floor, ctx.token.decimals
                ),
            })?;

        Ok(Self::new(
            ctx,
            TradeSizer::new(floor, config.sizing.remainder_policy),
            AllowanceGuard::new(
                config.gas.approval_gas_limit,
                config.timing.confirmation_timeout(),
                config.gas.reset_allowance_first,
            ),
            GasAdmission::new(config.gas.limit_multiplier),
            SwapExecutor::new(config.timing.confirmation_timeout(), config.dry_run),
            journal,
            RunnerConfig::from_config(config, min_amount_out),
        ))
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn sizer(&self) -> &TradeSizer {
        &self.sizer
    }

    /// Delay before the next tick: the poll interval, doubled per consecutive
    /// failed cycle (at most 8x), capped at the max backoff.
    pub fn next_delay(&self) -> Duration {
        let factor = 1u32 << self.consecutive_failures.min(3);
        (self.config.poll_interval * factor).min(self.config.max_backoff.max(self.config.poll_interval))
    }

    /// Tick until finished, stopped or cancelled.
    pub async fn run(&mut self, cancel: CancellationToken) -> RunSummary {
        info!(
            account = %self.ctx.account,
            token = %self.ctx.token.symbol,
            floor = %self.ctx.token.display(self.sizer.floor()),
            dry_run = self.executor.is_dry_run(),
            poll_ms = self.config.poll_interval.as_millis() as u64,
            "Sell loop started"
        );

        let mut last_end = None;
        loop {
            if cancel.is_cancelled() {
                self.state = RunState::Stopped;
                break;
            }

            let report = self.run_cycle(&cancel).await;
            let end = report.end.clone();
            self.journal.record(report);
            last_end = Some(end.clone());

            if end.is_terminal() {
                self.state = RunState::Finished;
                info!(cycles = self.cycle, sold = %self.sold, end = end.label(), "Holding sold");
                break;
            }
            if end == CycleEnd::Cancelled || self.executor.is_dry_run() {
                self.state = RunState::Stopped;
                break;
            }

            self.note_end(&end);
            self.state = RunState::Idle;
            let delay = self.next_delay();
            debug!(delay_ms = delay.as_millis() as u64, "Waiting for next tick");

            tokio::select! {
                _ = cancel.cancelled() => {
                    self.state = RunState::Stopped;
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(
            cycles = self.cycle,
            sold = %self.sold,
            state = ?self.state,
            "Sell loop stopped"
        );

        RunSummary {
            cycles: self.cycle,
            sold: self.sold,
            state: self.state,
            last_end,
        }
    }

    /// Count consecutive failed cycles for the backoff.
    fn note_end(&mut self, end: &CycleEnd) {
        if !end.is_failure() {
            self.consecutive_failures = 0;
            return;
        }
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.config.max_transient_retries {
            warn!(
                consecutive_failures = self.consecutive_failures,
                end = end.label(),
                "Cycles keep failing, backing off"
            );
        }
    }

    /// Run one full cycle and return its report. Never fails: errors end the
    /// cycle and are recorded.
    #[instrument(skip_all, fields(cycle = self.cycle + 1))]
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleReport {
        self.cycle += 1;
        let started_at = Utc::now();
        let start = Instant::now();

        let mut wallet = None;
        let mut attempts = Vec::new();
        let end = self.cycle_inner(cancel, &mut wallet, &mut attempts).await;

        CycleReport {
            cycle: self.cycle,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            wallet,
            attempts,
            end,
        }
    }

    async fn cycle_inner(
        &mut self,
        cancel: &CancellationToken,
        wallet_out: &mut Option<WalletSnapshot>,
        attempts: &mut Vec<AttemptRecord>,
    ) -> CycleEnd {
        self.state = RunState::Checking;

        let wallet = match self.refresh_wallet().await {
            Ok(wallet) => wallet,
            Err(e) => {
                warn!(error = %e, "Failed to read wallet state");
                return CycleEnd::GatewayError {
                    message: e.to_string(),
                };
            }
        };
        *wallet_out = Some(wallet);

        let balance = wallet.token_balance;
        if balance.is_zero() {
            info!("Token balance is zero");
            return CycleEnd::Exhausted;
        }
        if self.sizer.is_dust(balance) {
            info!(
                balance = %self.ctx.token.display(balance),
                floor = %self.ctx.token.display(self.sizer.floor()),
                "Remaining balance below floor, leaving it"
            );
            return CycleEnd::DustRemaining { balance };
        }

        match self.ctx.gateway.nonce().await {
            Ok(nonce) => self.ctx.nonces.reset(nonce),
            Err(e) => {
                warn!(error = %e, "Failed to read nonce");
                return CycleEnd::GatewayError {
                    message: e.to_string(),
                };
            }
        }

        let start = match self.pending_retry.take() {
            Some(retry) if retry.min(balance) >= self.sizer.floor() => retry.min(balance),
            _ => balance,
        };
        let schedule = self.sizer.schedule(start);

        info!(
            balance = %self.ctx.token.display(balance),
            native = %u256_math::format_units(wallet.native_balance, 18),
            start = %self.ctx.token.display(start),
            candidates = schedule.total_len(),
            "Cycle started"
        );

        match self.allowance.ensure(&self.ctx, start).await {
            Ok(AllowanceStatus::Sufficient) => {}
            Ok(AllowanceStatus::Approved { tx_hash }) => {
                debug!(tx_hash = %tx_hash, "Router approved");
            }
            Ok(AllowanceStatus::Pending { tx_hash }) => {
                return CycleEnd::ApprovalPending { tx_hash };
            }
            Err(CycleError::Gateway(e)) => {
                warn!(error = %e, "Allowance check failed");
                return CycleEnd::GatewayError {
                    message: e.to_string(),
                };
            }
            Err(e) => {
                warn!(error = %e, "Approval failed");
                return CycleEnd::ApprovalFailed {
                    message: e.to_string(),
                };
            }
        }

        // Gas burned by reverted attempts comes out of this
        let mut native_balance = wallet.native_balance;

        for amount_in in schedule {
            if cancel.is_cancelled() {
                return CycleEnd::Cancelled;
            }
            if !attempts.is_empty() && !self.config.candidate_pause.is_zero() {
                tokio::time::sleep(self.config.candidate_pause).await;
            }

            let candidate = TradeCandidate {
                amount_in,
                min_amount_out: self.config.min_amount_out,
            };

            self.state = RunState::Admitting;
            let plan = match self
                .admission
                .admit(&self.ctx, &candidate, native_balance)
                .await
            {
                Ok(Admission::Admitted(plan)) => plan,
                Ok(Admission::Rejected { reason }) => {
                    info!(
                        amount = %self.ctx.token.display(amount_in),
                        reason = %reason,
                        "Candidate not admitted, halving"
                    );
                    attempts.push(AttemptRecord {
                        amount_in,
                        estimated_gas: None,
                        outcome: SubmissionOutcome::NotAdmitted { reason },
                    });
                    continue;
                }
                Ok(Admission::Unaffordable {
                    required,
                    available,
                }) => {
                    warn!(
                        required = %u256_math::format_units(required, 18),
                        available = %u256_math::format_units(available, 18),
                        "Native balance cannot cover gas"
                    );
                    return CycleEnd::Unaffordable {
                        required,
                        available,
                    };
                }
                Err(e) => {
                    warn!(amount = %amount_in, error = %e, "Gas estimation failed");
                    self.pending_retry = Some(amount_in);
                    attempts.push(AttemptRecord {
                        amount_in,
                        estimated_gas: None,
                        outcome: SubmissionOutcome::GatewayError {
                            message: e.to_string(),
                            tx_hash: None,
                        },
                    });
                    return CycleEnd::GatewayError {
                        message: e.to_string(),
                    };
                }
            };

            self.state = RunState::Executing;
            let estimated_gas = Some(plan.estimated_gas);
            let gas_price = plan.params.effective_gas_price();
            let outcome = self.executor.execute(&self.ctx, &candidate, plan).await;
            attempts.push(AttemptRecord {
                amount_in,
                estimated_gas,
                outcome: outcome.clone(),
            });

            match outcome {
                SubmissionOutcome::Confirmed { .. } => {
                    self.sold += amount_in;
                    return CycleEnd::Sold { amount_in };
                }
                SubmissionOutcome::Reverted { gas_used, .. } => {
                    native_balance =
                        native_balance.saturating_sub(u256_math::gas_cost(gas_used, gas_price));
                }
                SubmissionOutcome::NotAdmitted { .. } => continue,
                SubmissionOutcome::GatewayError { message, .. } => {
                    self.pending_retry = Some(amount_in);
                    return CycleEnd::GatewayError { message };
                }
                SubmissionOutcome::DryRun { .. } => return CycleEnd::DryRun { amount_in },
            }
        }

        info!(attempts = attempts.len(), "No candidate could be sold this cycle");
        CycleEnd::Unsellable
    }

    /// Token balance, native balance and allowance, fetched concurrently.
    async fn refresh_wallet(&self) -> Result<WalletSnapshot, CycleError> {
        let ctx = &self.ctx;
        let (token_balance, native_balance, allowance) = tokio::join!(
            ctx.gateway.token_balance(ctx.token.address, ctx.account),
            ctx.gateway.native_balance(ctx.account),
            ctx.gateway.allowance(ctx.token.address, ctx.account, ctx.router)
        );

        Ok(WalletSnapshot {
            token_balance: token_balance?,
            native_balance: native_balance?,
            allowance: allowance?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizer::RemainderPolicy;
    use crate::testing::{test_context, EstimateScript, MockCall, MockGateway, SubmitScript};

    fn runner_with(gateway: Arc<MockGateway>, floor: u64, dry_run: bool) -> Runner {
        let ctx = Arc::new(test_context(gateway));
        Runner::new(
            ctx,
            TradeSizer::new(U256::from(floor), RemainderPolicy::Skip),
            AllowanceGuard::new(60_000, Duration::from_secs(5), false),
            GasAdmission::new(1.2),
            SwapExecutor::new(Duration::from_secs(5), dry_run),
            Arc::new(Journal::in_memory()),
            RunnerConfig {
                poll_interval: Duration::from_millis(5),
                max_backoff: Duration::from_millis(40),
                max_transient_retries: 3,
                candidate_pause: Duration::ZERO,
                min_amount_out: U256::from(1),
            },
        )
    }

    fn runner(gateway: Arc<MockGateway>) -> Runner {
        runner_with(gateway, 1, false)
    }

    fn amounts(values: &[u64]) -> Vec<U256> {
        values.iter().map(|v| U256::from(*v)).collect()
    }

    #[tokio::test]
    async fn test_first_admitted_candidate_is_sold() {
        let gateway = Arc::new(
            MockGateway::new(U256::from(1000))
                .with_allowance(U256::MAX)
                .with_max_sellable(Some(U256::from(300))),
        );
        let mut runner = runner(gateway.clone());

        let report = runner.run_cycle(&CancellationToken::new()).await;

        assert_eq!(report.end, CycleEnd::Sold { amount_in: U256::from(250) });
        assert_eq!(gateway.estimates(), amounts(&[1000, 500, 250]));
        assert_eq!(gateway.swaps(), amounts(&[250]));
        assert_eq!(report.attempts.len(), 3);
        assert_eq!(gateway.token_balance_now(), U256::from(750));
    }

    #[tokio::test]
    async fn test_approval_precedes_estimation() {
        let gateway = Arc::new(MockGateway::new(U256::from(1000)));
        let mut runner = runner(gateway.clone());

        let report = runner.run_cycle(&CancellationToken::new()).await;

        let calls = gateway.calls();
        assert_eq!(
            calls[0],
            MockCall::Approve {
                amount: U256::MAX,
                nonce: 7
            }
        );
        assert_eq!(
            calls[1],
            MockCall::Estimate {
                amount_in: U256::from(1000)
            }
        );
        assert_eq!(report.end, CycleEnd::Sold { amount_in: U256::from(1000) });
        // Swap uses the nonce after the approval
        assert!(matches!(calls.last(), Some(MockCall::Swap { nonce: 8, .. })));
    }

    #[tokio::test]
    async fn test_all_rejected_submits_nothing() {
        let gateway = Arc::new(
            MockGateway::new(U256::from(1000))
                .with_allowance(U256::MAX)
                .with_max_sellable(Some(U256::ZERO)),
        );
        let mut runner = runner(gateway.clone());

        let first = runner.run_cycle(&CancellationToken::new()).await;
        assert_eq!(first.end, CycleEnd::Unsellable);
        assert_eq!(first.attempts.len(), 10);
        assert_eq!(first.submissions(), 0);
        assert!(gateway.swaps().is_empty());

        // The next tick walks the same schedule again
        let second = runner.run_cycle(&CancellationToken::new()).await;
        assert_eq!(second.end, CycleEnd::Unsellable);
        assert_eq!(gateway.estimates().len(), 20);
        assert_eq!(second.cycle, 2);
    }

    #[tokio::test]
    async fn test_revert_moves_to_smaller_candidate() {
        let gateway = Arc::new(MockGateway::new(U256::from(1000)).with_allowance(U256::MAX));
        gateway.push_submit(SubmitScript::Revert);
        let mut runner = runner(gateway.clone());

        let report = runner.run_cycle(&CancellationToken::new()).await;

        assert!(matches!(
            report.attempts[0].outcome,
            SubmissionOutcome::Reverted { .. }
        ));
        assert_eq!(report.end, CycleEnd::Sold { amount_in: U256::from(500) });
        assert_eq!(gateway.swaps(), amounts(&[1000, 500]));
    }

    #[tokio::test]
    async fn test_zero_balance_finishes() {
        let gateway = Arc::new(MockGateway::new(U256::ZERO));
        let mut runner = runner(gateway.clone());

        let summary = runner.run(CancellationToken::new()).await;

        assert_eq!(summary.state, RunState::Finished);
        assert_eq!(summary.cycles, 1);
        assert_eq!(summary.last_end, Some(CycleEnd::Exhausted));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dust_finishes_under_skip() {
        let gateway = Arc::new(MockGateway::new(U256::from(5)).with_allowance(U256::MAX));
        let mut runner = runner_with(gateway.clone(), 10, false);

        let summary = runner.run(CancellationToken::new()).await;

        assert_eq!(summary.state, RunState::Finished);
        assert_eq!(
            summary.last_end,
            Some(CycleEnd::DustRemaining {
                balance: U256::from(5)
            })
        );
        assert!(gateway.estimates().is_empty());
    }

    #[tokio::test]
    async fn test_sells_until_exhausted() {
        let gateway = Arc::new(MockGateway::new(U256::from(1000)).with_allowance(U256::MAX));
        let mut runner = runner(gateway.clone());

        let summary = runner.run(CancellationToken::new()).await;

        assert_eq!(summary.state, RunState::Finished);
        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.sold, U256::from(1000));
        assert_eq!(gateway.token_balance_now(), U256::ZERO);
    }

    #[tokio::test]
    async fn test_every_swap_was_estimated_first() {
        let gateway = Arc::new(
            MockGateway::new(U256::from(1000))
                .with_allowance(U256::MAX)
                .with_max_sellable(Some(U256::from(200))),
        );
        gateway.push_submit(SubmitScript::Revert);
        let mut runner = runner(gateway.clone());

        runner.run(CancellationToken::new()).await;

        let calls = gateway.calls();
        for (i, call) in calls.iter().enumerate() {
            if let MockCall::Swap { amount_in, .. } = call {
                assert!(
                    calls[..i].iter().rev().any(
                        |c| matches!(c, MockCall::Estimate { amount_in: a } if a == amount_in)
                    ),
                    "swap of {amount_in} without a prior estimate"
                );
            }
        }
        assert_eq!(gateway.token_balance_now(), U256::ZERO);
    }

    #[tokio::test]
    async fn test_gateway_error_retries_same_candidate() {
        let gateway = Arc::new(
            MockGateway::new(U256::from(1000))
                .with_allowance(U256::MAX)
                .with_max_sellable(Some(U256::from(300))),
        );
        gateway.push_submit(SubmitScript::Timeout);
        let mut runner = runner(gateway.clone());

        let first = runner.run_cycle(&CancellationToken::new()).await;
        assert!(matches!(first.end, CycleEnd::GatewayError { .. }));
        assert_eq!(gateway.estimates(), amounts(&[1000, 500, 250]));

        let second = runner.run_cycle(&CancellationToken::new()).await;
        assert_eq!(second.end, CycleEnd::Sold { amount_in: U256::from(250) });
        // Second cycle starts from the remembered candidate, not the balance
        assert_eq!(gateway.estimates(), amounts(&[1000, 500, 250, 250]));
    }

    #[tokio::test]
    async fn test_estimate_transport_failure_retries_candidate() {
        let gateway = Arc::new(
            MockGateway::new(U256::from(1000))
                .with_allowance(U256::MAX)
                .with_max_sellable(Some(U256::from(600))),
        );
        gateway.push_estimate(EstimateScript::Simulate);
        gateway.push_estimate(EstimateScript::TransportError);
        let mut runner = runner(gateway.clone());

        let first = runner.run_cycle(&CancellationToken::new()).await;
        assert!(matches!(first.end, CycleEnd::GatewayError { .. }));
        assert_eq!(gateway.estimates(), amounts(&[1000, 500]));
        assert!(matches!(
            first.attempts[1].outcome,
            SubmissionOutcome::GatewayError { tx_hash: None, .. }
        ));
        assert!(gateway.swaps().is_empty());

        let second = runner.run_cycle(&CancellationToken::new()).await;
        assert_eq!(second.end, CycleEnd::Sold { amount_in: U256::from(500) });
        assert_eq!(gateway.estimates(), amounts(&[1000, 500, 500]));
    }

    #[tokio::test]
    async fn test_reverted_approval_backs_off() {
        let gateway = Arc::new(MockGateway::new(U256::from(1000)).with_approval_reverts());
        let mut runner = runner(gateway.clone());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            canceller.cancel();
        });

        let summary = runner.run(cancel).await;

        assert_eq!(summary.state, RunState::Stopped);
        assert!(matches!(summary.last_end, Some(CycleEnd::ApprovalFailed { .. })));
        assert!(runner.consecutive_failures >= 1);
        assert_eq!(u64::from(runner.consecutive_failures), summary.cycles);
        assert!(gateway.estimates().is_empty());
        assert!(gateway.swaps().is_empty());
    }

    #[tokio::test]
    async fn test_unaffordable_gas_submits_nothing() {
        let gateway = Arc::new(
            MockGateway::new(U256::from(1000))
                .with_allowance(U256::MAX)
                .with_native_balance(U256::from(1)),
        );
        let mut runner = runner(gateway.clone());

        let report = runner.run_cycle(&CancellationToken::new()).await;

        assert!(matches!(
            report.end,
            CycleEnd::Unaffordable { available, .. } if available == U256::from(1)
        ));
        // Smaller candidates cost the same gas, so the cycle stops at the first
        assert_eq!(gateway.estimates(), amounts(&[1000]));
        assert!(gateway.swaps().is_empty());
    }

    #[tokio::test]
    async fn test_revert_gas_counts_against_native_balance() {
        // Covers one swap at 22 gwei worst case, not a second after a revert burns 90k gas
        let native = U256::from(5_000_000_000_000_000u64);
        let gateway = Arc::new(
            MockGateway::new(U256::from(1000))
                .with_allowance(U256::MAX)
                .with_native_balance(native),
        );
        gateway.push_submit(SubmitScript::Revert);
        let mut runner = runner(gateway.clone());

        let report = runner.run_cycle(&CancellationToken::new()).await;

        let burned = u256_math::gas_cost(90_000, 22 * unloader_chain::GWEI);
        assert!(matches!(
            report.end,
            CycleEnd::Unaffordable { available, .. } if available == native - burned
        ));
        assert_eq!(gateway.estimates(), amounts(&[1000, 500]));
        assert_eq!(gateway.swaps(), amounts(&[1000]));
    }

    #[tokio::test]
    async fn test_unconfirmed_approval_waits() {
        let gateway = Arc::new(MockGateway::new(U256::from(1000)));
        gateway.time_out_approvals(1);
        let mut runner = runner(gateway.clone());

        let first = runner.run_cycle(&CancellationToken::new()).await;
        assert!(matches!(first.end, CycleEnd::GatewayError { .. }));

        let second = runner.run_cycle(&CancellationToken::new()).await;
        assert!(matches!(second.end, CycleEnd::ApprovalPending { .. }));
        assert_eq!(gateway.approvals(), vec![U256::MAX]);
        assert!(gateway.estimates().is_empty());

        gateway.confirm_pending_approval();
        let third = runner.run_cycle(&CancellationToken::new()).await;
        assert_eq!(third.end, CycleEnd::Sold { amount_in: U256::from(1000) });
        assert_eq!(gateway.approvals(), vec![U256::MAX]);
        assert!(matches!(gateway.calls().last(), Some(MockCall::Swap { nonce: 8, .. })));
    }

    #[tokio::test]
    async fn test_wallet_read_failure_backs_off() {
        let gateway = Arc::new(MockGateway::new(U256::from(1000)).with_allowance(U256::MAX));
        gateway.fail_balance_queries(2);
        let mut runner = runner(gateway.clone());

        assert_eq!(runner.next_delay(), Duration::from_millis(5));
        let summary = runner.run(CancellationToken::new()).await;

        assert_eq!(summary.state, RunState::Finished);
        assert_eq!(summary.cycles, 4);
        let journal = runner.journal.recent();
        assert!(matches!(journal[0].end, CycleEnd::GatewayError { .. }));
        assert!(journal[0].wallet.is_none());
        assert!(matches!(journal[1].end, CycleEnd::GatewayError { .. }));
        assert_eq!(journal[2].end, CycleEnd::Sold { amount_in: U256::from(1000) });
        assert_eq!(journal[3].end, CycleEnd::Exhausted);
    }

    #[test]
    fn test_backoff_growth_and_cap() {
        let gateway = Arc::new(MockGateway::new(U256::from(1000)));
        let mut runner = runner(gateway);

        let delays: Vec<u64> = (0..6)
            .map(|n| {
                runner.consecutive_failures = n;
                runner.next_delay().as_millis() as u64
            })
            .collect();
        // 5ms doubling, capped at 40ms (8x)
        assert_eq!(delays, vec![5, 10, 20, 40, 40, 40]);

        runner.config.max_backoff = Duration::from_millis(15);
        runner.consecutive_failures = 3;
        assert_eq!(runner.next_delay(), Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_dry_run_stops_after_one_cycle() {
        let gateway = Arc::new(MockGateway::new(U256::from(1000)).with_allowance(U256::MAX));
        let mut runner = runner_with(gateway.clone(), 1, true);

        let summary = runner.run(CancellationToken::new()).await;

        assert_eq!(summary.state, RunState::Stopped);
        assert_eq!(summary.cycles, 1);
        assert_eq!(
            summary.last_end,
            Some(CycleEnd::DryRun {
                amount_in: U256::from(1000)
            })
        );
        assert!(gateway.swaps().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_stops_loop() {
        let gateway = Arc::new(
            MockGateway::new(U256::from(1000))
                .with_allowance(U256::MAX)
                .with_max_sellable(Some(U256::ZERO)),
        );
        let mut runner = runner(gateway.clone());
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let summary = runner.run(cancel).await;

        assert_eq!(summary.state, RunState::Stopped);
        // Unsellable cycles keep ticking until cancelled
        assert!(summary.cycles >= 2);
        assert!(gateway.swaps().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_candidates() {
        let gateway = Arc::new(MockGateway::new(U256::from(1000)).with_allowance(U256::MAX));
        let mut runner = runner(gateway.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = runner.run_cycle(&cancel).await;
        assert_eq!(report.end, CycleEnd::Cancelled);
        assert!(gateway.estimates().is_empty());

        let summary = runner.run(cancel).await;
        assert_eq!(summary.state, RunState::Stopped);
        assert_eq!(summary.last_end, None);
    }

    #[tokio::test]
    async fn test_from_config_parses_floor() {
        let gateway = Arc::new(MockGateway::new(U256::from(1000)));
        let ctx = Arc::new(test_context(gateway));
        let mut config = UnloaderConfig::default();
        config.sizing.floor = "0.5".to_string();

        let runner =
            Runner::from_config(ctx.clone(), &config, U256::from(1), Arc::new(Journal::in_memory()))
                .unwrap();
        assert_eq!(
            runner.sizer().floor(),
            U256::from(500_000_000_000_000_000u128)
        );

        config.sizing.floor = "half".to_string();
        assert!(matches!(
            Runner::from_config(ctx, &config, U256::from(1), Arc::new(Journal::in_memory())),
            Err(ConfigError::Invalid {
                field: "sizing.floor",
                ..
            })
        ));
    }
}
