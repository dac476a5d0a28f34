//! Signing account and local nonce tracking.
//!
//! The wallet is handed to the gateway, which signs on submission. Nonces are
//! tracked locally so the approval and the swap of one cycle can be built
//! without a round trip each, and are re-read from the node every cycle.

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};

/// Local nonce counter.
#[derive(Debug)]
pub struct NonceManager {
    /// Next nonce to hand out
    current: AtomicU64,
    /// Last value read from the chain
    last_synced: AtomicU64,
}

impl NonceManager {
    pub fn new(initial_nonce: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_nonce),
            last_synced: AtomicU64::new(initial_nonce),
        }
    }

    /// Take the next nonce and increment the counter.
    #[inline]
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst)
    }

    /// Peek at the next nonce without consuming it.
    #[inline]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Move forward to `nonce` if we are behind it. Never moves backwards.
    pub fn sync(&self, nonce: u64) {
        self.current.fetch_max(nonce, Ordering::SeqCst);
        self.last_synced.store(nonce, Ordering::SeqCst);
    }

    /// Overwrite with the chain's pending nonce.
    pub fn reset(&self, chain_nonce: u64) {
        self.current.store(chain_nonce, Ordering::SeqCst);
        self.last_synced.store(chain_nonce, Ordering::SeqCst);
    }

    /// Value last read from the chain.
    pub fn last_synced(&self) -> u64 {
        self.last_synced.load(Ordering::SeqCst)
    }
}

/// Parse a hex private key (with or without 0x prefix) into a wallet.
pub fn wallet_from_key(private_key: &str) -> Result<(EthereumWallet, Address)> {
    let key_str = private_key.trim().trim_start_matches("0x");
    let signer: PrivateKeySigner = key_str
        .parse()
        .context("private key is not a valid secp256k1 hex key")?;
    let address = signer.address();
    Ok((EthereumWallet::from(signer), address))
}
