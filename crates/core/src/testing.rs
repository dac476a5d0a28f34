//! In-memory chain gateway for tests.

use crate::context::{Explorer, SellContext, SwapTemplate, TokenInfo};
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use unloader_chain::{
    create_gas_strategy, swap_amount_in, ChainGateway, FeeSuggestion, GatewayError,
    ReceiptSummary, SwapEntryPoint, TokenMetadata, GWEI,
};

pub const TOKEN: Address = Address::new([0x70; 20]);
pub const ROUTER: Address = Address::new([0x7a; 20]);
pub const WETH: Address = Address::new([0xee; 20]);
pub const ACCOUNT: Address = Address::new([0xaa; 20]);

const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

/// How the next swap submission behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitScript {
    Confirm,
    Revert,
    /// Broadcast, but no receipt within the confirmation timeout
    Timeout,
    /// Never reaches the network
    TransportError,
}

/// How the next swap estimate behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateScript {
    /// Simulate against balance, allowance and `max_sellable`
    Simulate,
    /// The node does not answer
    TransportError,
}

/// A call observed by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Estimate { amount_in: U256 },
    Approve { amount: U256, nonce: u64 },
    Swap { amount_in: U256, nonce: u64, gas_limit: u64 },
}

#[derive(Debug)]
struct MockState {
    token_balance: U256,
    native_balance: U256,
    allowance: U256,
    nonce: u64,
    /// Largest amount that simulates successfully; `None` means everything passes
    max_sellable: Option<U256>,
    estimate_gas: u64,
    approval_reverts: bool,
    submit_script: VecDeque<SubmitScript>,
    estimate_script: VecDeque<EstimateScript>,
    approval_timeouts: usize,
    /// Broadcast approval without a receipt: hash, amount, nonce
    pending_approval: Option<(B256, U256, u64)>,
    receipts: Vec<ReceiptSummary>,
    failing_balance_queries: usize,
    calls: Vec<MockCall>,
    tx_counter: u8,
}

#[derive(Debug)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    /// Account holding `token_balance`, 10 ETH, no allowance.
    pub fn new(token_balance: U256) -> Self {
        Self {
            state: Mutex::new(MockState {
                token_balance,
                native_balance: U256::from(10u64) * U256::from(10u64).pow(U256::from(18)),
                allowance: U256::ZERO,
                nonce: 7,
                max_sellable: None,
                estimate_gas: 150_000,
                approval_reverts: false,
                submit_script: VecDeque::new(),
                estimate_script: VecDeque::new(),
                approval_timeouts: 0,
                pending_approval: None,
                receipts: Vec::new(),
                failing_balance_queries: 0,
                calls: Vec::new(),
                tx_counter: 0,
            }),
        }
    }

    pub fn with_allowance(self, allowance: U256) -> Self {
        self.state.lock().allowance = allowance;
        self
    }

    pub fn with_native_balance(self, balance: U256) -> Self {
        self.state.lock().native_balance = balance;
        self
    }

    pub fn with_max_sellable(self, max: Option<U256>) -> Self {
        self.state.lock().max_sellable = max;
        self
    }

    pub fn with_approval_reverts(self) -> Self {
        self.state.lock().approval_reverts = true;
        self
    }

    pub fn set_max_sellable(&self, max: Option<U256>) {
        self.state.lock().max_sellable = max;
    }

    pub fn push_submit(&self, script: SubmitScript) {
        self.state.lock().submit_script.push_back(script);
    }

    pub fn push_estimate(&self, script: EstimateScript) {
        self.state.lock().estimate_script.push_back(script);
    }

    /// The next `count` approvals are broadcast but stay unmined.
    pub fn time_out_approvals(&self, count: usize) {
        self.state.lock().approval_timeouts = count;
    }

    /// Mine the approval left pending by a confirmation timeout.
    pub fn confirm_pending_approval(&self) {
        let mut state = self.state.lock();
        if let Some((tx_hash, amount, _)) = state.pending_approval.take() {
            state.allowance = amount;
            state.receipts.push(ReceiptSummary {
                tx_hash,
                success: true,
                block_number: Some(102),
                gas_used: 46_000,
            });
        }
    }

    /// Evict the pending approval, freeing its nonce.
    pub fn drop_pending_approval(&self) {
        let mut state = self.state.lock();
        if let Some((_, _, nonce)) = state.pending_approval.take() {
            state.nonce = nonce;
        }
    }

    pub fn fail_balance_queries(&self, count: usize) {
        self.state.lock().failing_balance_queries = count;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn estimates(&self) -> Vec<U256> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Estimate { amount_in } => Some(amount_in),
                _ => None,
            })
            .collect()
    }

    pub fn swaps(&self) -> Vec<U256> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Swap { amount_in, .. } => Some(amount_in),
                _ => None,
            })
            .collect()
    }

    pub fn approvals(&self) -> Vec<U256> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Approve { amount, .. } => Some(amount),
                _ => None,
            })
            .collect()
    }

    pub fn token_balance_now(&self) -> U256 {
        self.state.lock().token_balance
    }

    pub fn allowance_now(&self) -> U256 {
        self.state.lock().allowance
    }

    fn next_hash(state: &mut MockState) -> B256 {
        state.tx_counter = state.tx_counter.wrapping_add(1);
        B256::repeat_byte(state.tx_counter)
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    fn account(&self) -> Address {
        ACCOUNT
    }

    fn chain_id(&self) -> u64 {
        1
    }

    async fn token_balance(&self, _token: Address, _owner: Address) -> Result<U256, GatewayError> {
        let mut state = self.state.lock();
        if state.failing_balance_queries > 0 {
            state.failing_balance_queries -= 1;
            return Err(GatewayError::Transport("connection reset".to_string()));
        }
        Ok(state.token_balance)
    }

    async fn native_balance(&self, _owner: Address) -> Result<U256, GatewayError> {
        Ok(self.state.lock().native_balance)
    }

    async fn allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256, GatewayError> {
        Ok(self.state.lock().allowance)
    }

    async fn token_metadata(&self, _token: Address) -> Result<TokenMetadata, GatewayError> {
        Ok(TokenMetadata {
            decimals: 18,
            symbol: "MOCK".to_string(),
        })
    }

    async fn fee_suggestion(&self) -> Result<FeeSuggestion, GatewayError> {
        Ok(FeeSuggestion {
            base_fee: Some(10 * GWEI),
            priority_fee: Some(GWEI),
            gas_price: 11 * GWEI,
        })
    }

    async fn nonce(&self) -> Result<u64, GatewayError> {
        Ok(self.state.lock().nonce)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, GatewayError> {
        let mut state = self.state.lock();
        let Some(amount_in) = tx.input.input().and_then(|data| swap_amount_in(data)) else {
            return Ok(50_000);
        };
        state.calls.push(MockCall::Estimate { amount_in });

        let script = state.estimate_script.pop_front().unwrap_or(EstimateScript::Simulate);
        if script == EstimateScript::TransportError {
            return Err(GatewayError::Transport("estimate request timed out".to_string()));
        }
        if amount_in > state.token_balance || amount_in > state.allowance {
            return Err(GatewayError::Rejected {
                code: 3,
                message: "execution reverted: TransferHelper: TRANSFER_FROM_FAILED".to_string(),
            });
        }
        match state.max_sellable {
            Some(max) if amount_in > max => Err(GatewayError::Rejected {
                code: 3,
                message: "execution reverted: UniswapV2: INSUFFICIENT_OUTPUT_AMOUNT".to_string(),
            }),
            _ => Ok(state.estimate_gas),
        }
    }

    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<ReceiptSummary>, GatewayError> {
        let state = self.state.lock();
        Ok(state.receipts.iter().find(|r| r.tx_hash == tx_hash).copied())
    }

    async fn submit(
        &self,
        tx: TransactionRequest,
        confirm_timeout: Duration,
    ) -> Result<ReceiptSummary, GatewayError> {
        let mut state = self.state.lock();
        let data = tx.input.input().cloned().unwrap_or_default();
        let nonce = tx.nonce.unwrap_or_default();
        let gas_limit = tx.gas.unwrap_or_default();

        if data.len() >= 68 && data[..4] == APPROVE_SELECTOR {
            let amount = U256::from_be_slice(&data[36..68]);
            state.calls.push(MockCall::Approve { amount, nonce });
            state.nonce = state.nonce.max(nonce + 1);
            let tx_hash = Self::next_hash(&mut state);
            if state.approval_timeouts > 0 {
                state.approval_timeouts -= 1;
                state.pending_approval = Some((tx_hash, amount, nonce));
                return Err(GatewayError::ConfirmationTimeout {
                    tx_hash,
                    after: confirm_timeout,
                });
            }
            let success = !state.approval_reverts;
            if success {
                state.allowance = amount;
            }
            let receipt = ReceiptSummary {
                tx_hash,
                success,
                block_number: Some(100),
                gas_used: 46_000,
            };
            state.receipts.push(receipt);
            return Ok(receipt);
        }

        let amount_in = swap_amount_in(&data).unwrap_or_default();
        let script = state.submit_script.pop_front().unwrap_or(SubmitScript::Confirm);
        if script == SubmitScript::TransportError {
            return Err(GatewayError::Transport("broadcast failed".to_string()));
        }

        state.calls.push(MockCall::Swap {
            amount_in,
            nonce,
            gas_limit,
        });
        state.nonce = state.nonce.max(nonce + 1);
        let tx_hash = Self::next_hash(&mut state);

        let receipt = match script {
            SubmitScript::Confirm => {
                state.token_balance -= amount_in;
                if state.allowance != U256::MAX {
                    state.allowance -= amount_in;
                }
                ReceiptSummary {
                    tx_hash,
                    success: true,
                    block_number: Some(101),
                    gas_used: 120_000,
                }
            }
            SubmitScript::Revert => ReceiptSummary {
                tx_hash,
                success: false,
                block_number: Some(101),
                gas_used: 90_000,
            },
            SubmitScript::Timeout | SubmitScript::TransportError => {
                return Err(GatewayError::ConfirmationTimeout {
                    tx_hash,
                    after: confirm_timeout,
                })
            }
        };
        state.receipts.push(receipt);
        Ok(receipt)
    }
}

/// Context over `gateway` with mainnet-like EIP-1559 pricing.
pub fn test_context(gateway: Arc<MockGateway>) -> SellContext {
    SellContext::new(
        gateway,
        TokenInfo {
            address: TOKEN,
            decimals: 18,
            symbol: "MOCK".to_string(),
        },
        ROUTER,
        WETH,
        create_gas_strategy("Eip1559", 1.5, 2.0, 2.0, 300.0),
        SwapTemplate {
            entry_point: SwapEntryPoint::Standard,
            deadline: Duration::from_secs(60),
        },
        Explorer::new("https://etherscan.io"),
    )
}
