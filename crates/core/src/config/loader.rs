//! Settings loader that ties together file, profile and environment.
//!
//! Resolution order:
//! 1. `UNLOADER_CONFIG` names a TOML file, otherwise the `UNLOADER_PROFILE` profile
//! 2. `DRY_RUN` overrides the file's `dry_run`
//! 3. `${VAR}` expansion and address parsing for the `[chain]` section
//! 4. `PRIVATE_KEY` (or `PK`) is parsed into a wallet

use super::chain::ResolvedChain;
use super::UnloaderConfig;
use crate::error::ConfigError;
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use tracing::info;
use unloader_chain::wallet_from_key;

/// Everything needed to start the unloader.
#[derive(Clone)]
pub struct Settings {
    pub config: UnloaderConfig,
    pub chain: ResolvedChain,
    pub wallet: EthereumWallet,
    pub account: Address,
    /// Parsed `sizing.min_amount_out`
    pub min_amount_out: U256,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("profile", &self.config.profile)
            .field("chain", &self.chain)
            .field("account", &self.account)
            .field("min_amount_out", &self.min_amount_out)
            .finish_non_exhaustive()
    }
}

/// Load settings from the process environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let mut config = match std::env::var("UNLOADER_CONFIG") {
        Ok(path) if !path.trim().is_empty() => {
            info!(path = %path, "Loading config file");
            UnloaderConfig::from_file(path.trim())?
        }
        _ => UnloaderConfig::from_env(),
    };

    if let Ok(flag) = std::env::var("DRY_RUN") {
        config.dry_run = parse_flag(&flag);
    }

    let private_key = std::env::var("PRIVATE_KEY")
        .or_else(|_| std::env::var("PK"))
        .map_err(|_| ConfigError::MissingEnv("PRIVATE_KEY"))?;

    resolve_settings(config, &private_key)
}

/// Validate `config` and combine it with the signing key.
pub fn resolve_settings(config: UnloaderConfig, private_key: &str) -> Result<Settings, ConfigError> {
    config.validate()?;
    let chain = config.chain.resolve()?;

    let (wallet, account) =
        wallet_from_key(private_key).map_err(|e| ConfigError::InvalidKey(e.to_string()))?;

    let min_amount_out = config
        .sizing
        .min_amount_out
        .trim()
        .parse::<U256>()
        .map_err(|e| ConfigError::Invalid {
            field: "sizing.min_amount_out",
            message: e.to_string(),
        })?;

    Ok(Settings {
        config,
        chain,
        wallet,
        account,
        min_amount_out,
    })
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
