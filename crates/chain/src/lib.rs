//! Unloader chain interaction layer.
//!
//! This crate provides:
//! - The `ChainGateway` capability and its alloy HTTP implementation
//! - ERC20 and V2 router contract bindings
//! - Gas strategy abstraction (Legacy + EIP-1559) with priority fee escalation
//! - Wallet loading and local nonce tracking

pub mod contracts;
mod error;
pub mod gas;
mod gateway;
mod provider;
mod signer;

pub use contracts::{encode_approve, encode_swap, swap_amount_in, SwapCall, SwapEntryPoint};
pub use error::GatewayError;
pub use gas::{create_gas_strategy, FeeSuggestion, GasParams, GasStrategy, GWEI};
pub use gateway::{ChainGateway, ReceiptSummary, TokenMetadata};
pub use provider::AlloyGateway;
pub use signer::{wallet_from_key, NonceManager};
