//! Chain gateway capability.
//!
//! Everything the sell loop needs from the network goes through this trait:
//! state queries, dry-run gas estimation and signed submission. The alloy
//! implementation lives in [`crate::AlloyGateway`]; tests substitute an
//! in-memory one.

use crate::error::GatewayError;
use crate::gas::FeeSuggestion;
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Token metadata used for human-readable logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub decimals: u8,
    pub symbol: String,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            decimals: 18,
            symbol: "TOKEN".to_string(),
        }
    }
}

/// What the node reported once a submitted transaction was mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: B256,
    /// `true` when the receipt status is 1.
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

#[async_trait]
pub trait ChainGateway: Send + Sync + Debug {
    /// Address of the signing account.
    fn account(&self) -> Address;

    /// Chain id the gateway is connected to.
    fn chain_id(&self) -> u64;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, GatewayError>;

    async fn native_balance(&self, owner: Address) -> Result<U256, GatewayError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, GatewayError>;

    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, GatewayError>;

    /// Current fee data for pricing the next transaction.
    async fn fee_suggestion(&self) -> Result<FeeSuggestion, GatewayError>;

    /// Pending nonce of the signing account.
    async fn nonce(&self) -> Result<u64, GatewayError>;

    /// Simulate `tx` and return the gas it would use. Never broadcasts.
    ///
    /// A revert surfaces as [`GatewayError::Rejected`].
    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, GatewayError>;

    /// Receipt of an earlier transaction, `None` while it is not mined.
    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<ReceiptSummary>, GatewayError>;

    /// Sign and broadcast `tx`, then wait up to `confirm_timeout` for its receipt.
    async fn submit(
        &self,
        tx: TransactionRequest,
        confirm_timeout: Duration,
    ) -> Result<ReceiptSummary, GatewayError>;
}
