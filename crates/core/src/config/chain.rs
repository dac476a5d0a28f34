//! Chain, contract and gas configuration.

use crate::error::ConfigError;
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Uniswap V2 router on Ethereum mainnet.
pub const MAINNET_V2_ROUTER: &str = "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D";
/// WETH on Ethereum mainnet.
pub const MAINNET_WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

/// Endpoint and contract addresses. Every string supports `${VAR}` and
/// `${VAR:-default}` expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// HTTP RPC endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Expected chain id. Startup fails if the node reports a different one.
    #[serde(default)]
    pub chain_id: Option<u64>,
    /// Block explorer base URL for log links
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
    /// Token to sell
    #[serde(default = "default_token")]
    pub token: String,
    /// V2-style router
    #[serde(default = "default_router")]
    pub router: String,
    /// Wrapped native token (second hop of the path)
    #[serde(default = "default_wrapped_native")]
    pub wrapped_native: String,
}

fn default_rpc_url() -> String {
    "${RPC_URL}".to_string()
}
fn default_explorer_url() -> String {
    "${EXPLORER_URL:-https://etherscan.io}".to_string()
}
fn default_token() -> String {
    "${TOKEN_ADDRESS}".to_string()
}
fn default_router() -> String {
    format!("${{ROUTER_ADDRESS:-{MAINNET_V2_ROUTER}}}")
}
fn default_wrapped_native() -> String {
    format!("${{WETH_ADDRESS:-{MAINNET_WETH}}}")
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: None,
            explorer_url: default_explorer_url(),
            token: default_token(),
            router: default_router(),
            wrapped_native: default_wrapped_native(),
        }
    }
}

/// Chain settings with environment expanded and addresses parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChain {
    pub rpc_url: String,
    pub chain_id: Option<u64>,
    pub explorer_url: String,
    pub token: Address,
    pub router: Address,
    pub wrapped_native: Address,
}

impl ChainConfig {
    /// Expand environment variables and parse addresses.
    pub fn resolve(&self) -> Result<ResolvedChain, ConfigError> {
        let rpc_url = expand_required("chain.rpc_url", &self.rpc_url)?;
        let explorer_url = expand_required("chain.explorer_url", &self.explorer_url)?;

        Ok(ResolvedChain {
            rpc_url,
            chain_id: self.chain_id,
            explorer_url: explorer_url.trim_end_matches('/').to_string(),
            token: resolve_address("chain.token", &self.token)?,
            router: resolve_address("chain.router", &self.router)?,
            wrapped_native: resolve_address("chain.wrapped_native", &self.wrapped_native)?,
        })
    }
}

/// Gas pricing model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GasPricingModel {
    /// Legacy gas pricing (gas price only)
    Legacy,
    /// EIP-1559 (base fee + priority fee)
    #[default]
    Eip1559,
}

impl GasPricingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GasPricingModel::Legacy => "Legacy",
            GasPricingModel::Eip1559 => "Eip1559",
        }
    }
}

/// Gas pricing and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    /// Gas pricing model
    #[serde(default)]
    pub pricing: GasPricingModel,
    /// Multiplier over the network-suggested priority fee (or gas price for Legacy)
    #[serde(default = "default_priority_escalation")]
    pub priority_escalation: f64,
    /// Priority fee floor in gwei
    #[serde(default = "default_min_priority_fee")]
    pub min_priority_fee_gwei: f64,
    /// max_fee_per_gas = base_fee * this + priority fee
    #[serde(default = "default_base_fee_multiplier")]
    pub base_fee_multiplier: f64,
    /// Maximum price per gas willing to pay (in gwei)
    #[serde(default = "default_max_fee")]
    pub max_fee_gwei: f64,
    /// Gas limit multiplier over the estimate (e.g., 1.2 for 20% buffer)
    #[serde(default = "default_limit_multiplier")]
    pub limit_multiplier: f64,
    /// Fixed gas limit for approve transactions
    #[serde(default = "default_approval_gas_limit")]
    pub approval_gas_limit: u64,
    /// Approve 0 before approving MAX (tokens like USDT refuse non-zero to non-zero)
    #[serde(default)]
    pub reset_allowance_first: bool,
}

fn default_priority_escalation() -> f64 {
    1.5
}
fn default_min_priority_fee() -> f64 {
    2.0
}
fn default_base_fee_multiplier() -> f64 {
    2.0
}
fn default_max_fee() -> f64 {
    300.0
}
fn default_limit_multiplier() -> f64 {
    1.2
}
fn default_approval_gas_limit() -> u64 {
    60_000
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            pricing: GasPricingModel::default(),
            priority_escalation: default_priority_escalation(),
            min_priority_fee_gwei: default_min_priority_fee(),
            base_fee_multiplier: default_base_fee_multiplier(),
            max_fee_gwei: default_max_fee(),
            limit_multiplier: default_limit_multiplier(),
            approval_gas_limit: default_approval_gas_limit(),
            reset_allowance_first: false,
        }
    }
}

fn env_pattern() -> &'static regex_lite::Regex {
    static RE: OnceLock<regex_lite::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex_lite::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("static env pattern")
    })
}

/// Expand `${VAR}` and `${VAR:-default}` patterns with environment variable values.
/// Unset variables without a default are left untouched.
pub(crate) fn expand_env(s: &str) -> String {
    env_pattern()
        .replace_all(s, |caps: &regex_lite::Captures<'_>| {
            let name = &caps[1];
            match std::env::var(name) {
                Ok(value) if !value.is_empty() => value,
                _ => match caps.get(2) {
                    Some(default) => default.as_str().to_string(),
                    None => caps[0].to_string(),
                },
            }
        })
        .into_owned()
}

fn expand_required(field: &'static str, raw: &str) -> Result<String, ConfigError> {
    let value = expand_env(raw);
    if let Some(caps) = env_pattern().captures(&value) {
        return Err(ConfigError::Invalid {
            field,
            message: format!("environment variable {} is not set", &caps[1]),
        });
    }
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field,
            message: "empty value".to_string(),
        });
    }
    Ok(value.trim().to_string())
}

fn resolve_address(field: &'static str, raw: &str) -> Result<Address, ConfigError> {
    let value = expand_required(field, raw)?;
    value
        .parse::<Address>()
        .map_err(|_| ConfigError::InvalidAddress { field, value })
}
