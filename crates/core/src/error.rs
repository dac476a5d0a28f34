//! Error types for configuration and sell cycles.

use alloy::primitives::B256;
use std::path::PathBuf;
use thiserror::Error;
use unloader_chain::GatewayError;

/// Configuration could not be loaded or is invalid. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid address for {field}: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// A sell cycle could not proceed. Caught by the run loop and recorded.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("approval transaction {tx_hash} reverted")]
    ApprovalReverted { tx_hash: B256 },
}

impl CycleError {
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            CycleError::Gateway(e) => e.tx_hash(),
            CycleError::ApprovalReverted { tx_hash } => Some(*tx_hash),
        }
    }
}
