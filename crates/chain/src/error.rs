//! Gateway error taxonomy.
//!
//! The split that matters to callers is between a node *answering* with an
//! error (the request was understood and refused, e.g. a revert during gas
//! estimation) and the node not answering usefully at all (transport failure,
//! timeout). Only the gas admission check interprets the first kind as an
//! expected outcome; everywhere else both are plain gateway failures.

use alloy::contract::Error as ContractError;
use alloy::primitives::B256;
use alloy::transports::{RpcError, TransportErrorKind};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The node returned a JSON-RPC error response (revert, cannot estimate,
    /// nonce too low, ...).
    #[error("node rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    /// Connectivity or decoding failure below the JSON-RPC layer.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A query did not complete within the request timeout.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The transaction was broadcast but no receipt arrived in time.
    #[error("no receipt for {tx_hash} after {after:?}")]
    ConfirmationTimeout { tx_hash: B256, after: Duration },
}

impl GatewayError {
    /// True when the node refused the request rather than failing to answer.
    pub fn is_rejection(&self) -> bool {
        matches!(self, GatewayError::Rejected { .. })
    }

    /// Hash of a transaction that reached the network, if this error happened after broadcast.
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            GatewayError::ConfirmationTimeout { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

impl From<RpcError<TransportErrorKind>> for GatewayError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        match err {
            RpcError::ErrorResp(payload) => GatewayError::Rejected {
                code: payload.code,
                message: payload.message.to_string(),
            },
            other => GatewayError::Transport(other.to_string()),
        }
    }
}

impl From<ContractError> for GatewayError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::TransportError(e) => e.into(),
            other => GatewayError::Transport(other.to_string()),
        }
    }
}
