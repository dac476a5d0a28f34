//! Process-wide sell context.
//!
//! Built once at startup and shared by every component: the gateway, the
//! account, the token and router, the gas strategy and the nonce counter.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::TransactionRequest;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use unloader_chain::{
    encode_approve, encode_swap, ChainGateway, GasStrategy, NonceManager, SwapCall, SwapEntryPoint,
    TokenMetadata,
};

use crate::sizer::TradeCandidate;
use crate::u256_math;

/// The token being sold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
}

impl TokenInfo {
    pub fn new(address: Address, metadata: TokenMetadata) -> Self {
        Self {
            address,
            decimals: metadata.decimals,
            symbol: metadata.symbol,
        }
    }

    /// Raw amount rendered in whole tokens, for logs.
    pub fn display(&self, amount: U256) -> String {
        format!("{} {}", u256_math::format_units(amount, self.decimals), self.symbol)
    }
}

/// How swaps are encoded.
#[derive(Debug, Clone, Copy)]
pub struct SwapTemplate {
    pub entry_point: SwapEntryPoint,
    /// Swap deadline relative to the time the request is built
    pub deadline: Duration,
}

/// Block explorer link builder.
#[derive(Debug, Clone)]
pub struct Explorer {
    base: String,
}

impl Explorer {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn tx_url(&self, tx_hash: B256) -> String {
        format!("{}/tx/{}", self.base, tx_hash)
    }

    pub fn address_url(&self, address: Address) -> String {
        format!("{}/address/{}", self.base, address)
    }
}

/// Shared state for one unloader process.
pub struct SellContext {
    pub gateway: Arc<dyn ChainGateway>,
    pub account: Address,
    pub chain_id: u64,
    pub token: TokenInfo,
    pub router: Address,
    pub wrapped_native: Address,
    pub gas: Box<dyn GasStrategy>,
    pub nonces: NonceManager,
    pub swap: SwapTemplate,
    pub explorer: Explorer,
}

impl SellContext {
    /// Build a context for `gateway`'s account. The nonce counter starts at
    /// zero and is reconciled from the chain at the start of every cycle.
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        token: TokenInfo,
        router: Address,
        wrapped_native: Address,
        gas: Box<dyn GasStrategy>,
        swap: SwapTemplate,
        explorer: Explorer,
    ) -> Self {
        Self {
            account: gateway.account(),
            chain_id: gateway.chain_id(),
            gateway,
            token,
            router,
            wrapped_native,
            gas,
            nonces: NonceManager::new(0),
            swap,
            explorer,
        }
    }

    /// Swap request for `candidate`, without nonce, gas limit or fees.
    ///
    /// `now_unix` is the current unix time; the deadline is offset from it.
    pub fn swap_request(&self, candidate: &TradeCandidate, now_unix: u64) -> TransactionRequest {
        let call = SwapCall {
            amount_in: candidate.amount_in,
            amount_out_min: candidate.min_amount_out,
            token: self.token.address,
            wrapped_native: self.wrapped_native,
            recipient: self.account,
            deadline: U256::from(now_unix.saturating_add(self.swap.deadline.as_secs())),
        };

        TransactionRequest::default()
            .with_from(self.account)
            .with_to(self.router)
            .with_input(encode_swap(self.swap.entry_point, &call))
            .with_value(U256::ZERO)
            .with_chain_id(self.chain_id)
    }

    /// `approve(router, amount)` request on the token, without nonce or fees.
    pub fn approve_request(&self, amount: U256) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.account)
            .with_to(self.token.address)
            .with_input(encode_approve(self.router, amount))
            .with_value(U256::ZERO)
            .with_chain_id(self.chain_id)
    }
}

impl fmt::Debug for SellContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SellContext")
            .field("account", &self.account)
            .field("chain_id", &self.chain_id)
            .field("token", &self.token)
            .field("router", &self.router)
            .field("gas_strategy", &self.gas.strategy_name())
            .field("swap", &self.swap)
            .finish_non_exhaustive()
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
