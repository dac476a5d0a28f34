//! Configuration system for the unloader.
//!
//! This module provides:
//! - Runtime configuration (profiles, sizing, gas, timing)
//! - Chain configuration (RPC endpoint, contract addresses, env expansion)
//! - The settings loader used by the binary

mod bot;
mod chain;
mod loader;

pub use bot::{SizingConfig, TimingConfig, UnloaderConfig};
pub use chain::{
    ChainConfig, GasConfig, GasPricingModel, ResolvedChain, MAINNET_V2_ROUTER, MAINNET_WETH,
};
pub use loader::{load_settings, resolve_settings, Settings};
