//! Chain gateway over alloy HTTP providers.

use crate::contracts::IERC20;
use crate::error::GatewayError;
use crate::gas::FeeSuggestion;
use crate::gateway::{ChainGateway, ReceiptSummary, TokenMetadata};
use alloy::eips::BlockNumberOrTag;
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Gateway backed by a single HTTP endpoint.
///
/// Providers are built per call; the wallet-enabled one only for submission.
#[derive(Clone)]
pub struct AlloyGateway {
    rpc_url: Url,
    wallet: EthereumWallet,
    account: Address,
    chain_id: u64,
    request_timeout: Duration,
}

impl AlloyGateway {
    /// Connect to `rpc_url` and verify it answers by fetching the chain id.
    pub async fn connect(
        rpc_url: &str,
        wallet: EthereumWallet,
        account: Address,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let rpc_url: Url = rpc_url.parse()?;

        info!(rpc = %redact_url(&rpc_url), account = %account, "Connecting to chain gateway");

        let provider = ProviderBuilder::new().on_http(rpc_url.clone());
        let (chain_id, block) = tokio::time::timeout(request_timeout, async {
            tokio::try_join!(
                async { provider.get_chain_id().await },
                async { provider.get_block_number().await }
            )
        })
        .await
        .map_err(|_| GatewayError::Timeout {
            operation: "connect",
            after: request_timeout,
        })?
        .map_err(GatewayError::from)?;

        info!(chain_id = chain_id, block = block, "Provider connection verified");

        Ok(Self {
            rpc_url,
            wallet,
            account,
            chain_id,
            request_timeout,
        })
    }

    /// Get the RPC URL.
    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    /// Run one node query under the request timeout.
    async fn bounded<T, E, F>(&self, operation: &'static str, fut: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<GatewayError>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(GatewayError::Timeout {
                operation,
                after: self.request_timeout,
            }),
        }
    }
}

#[async_trait]
impl ChainGateway for AlloyGateway {
    fn account(&self) -> Address {
        self.account
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let erc20 = IERC20::new(token, &provider);
        let balance = self
            .bounded("balanceOf", async { erc20.balanceOf(owner).call().await })
            .await?;
        Ok(balance._0)
    }

    async fn native_balance(&self, owner: Address) -> Result<U256, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        self.bounded("get_balance", async { provider.get_balance(owner).await })
            .await
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let erc20 = IERC20::new(token, &provider);
        let allowance = self
            .bounded("allowance", async {
                erc20.allowance(owner, spender).call().await
            })
            .await?;
        Ok(allowance._0)
    }

    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let erc20 = IERC20::new(token, &provider);

        let decimals_call = erc20.decimals();
        let symbol_call = erc20.symbol();
        let (decimals, symbol) = tokio::join!(
            self.bounded("decimals", async { decimals_call.call().await }),
            self.bounded("symbol", async { symbol_call.call().await })
        );

        let decimals = decimals?._0;
        // Some older tokens return bytes32 for symbol()
        let symbol = match symbol {
            Ok(s) => s._0,
            Err(e) => {
                warn!(token = %token, error = %e, "Token symbol unavailable");
                TokenMetadata::default().symbol
            }
        };

        Ok(TokenMetadata { decimals, symbol })
    }

    async fn fee_suggestion(&self) -> Result<FeeSuggestion, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());

        let (block, priority_fee, gas_price) = tokio::join!(
            self.bounded("get_block_by_number", async {
                provider.get_block_by_number(BlockNumberOrTag::Latest).await
            }),
            self.bounded("get_max_priority_fee_per_gas", async {
                provider.get_max_priority_fee_per_gas().await
            }),
            self.bounded("get_gas_price", async { provider.get_gas_price().await })
        );

        let base_fee = block?
            .and_then(|b| b.header.base_fee_per_gas)
            .map(|b| b as u128);

        // Not every node implements eth_maxPriorityFeePerGas
        let priority_fee = match priority_fee {
            Ok(fee) => Some(fee),
            Err(e) => {
                debug!(error = %e, "Priority fee suggestion unavailable");
                None
            }
        };

        Ok(FeeSuggestion {
            base_fee,
            priority_fee,
            gas_price: gas_price?,
        })
    }

    async fn nonce(&self) -> Result<u64, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        self.bounded("get_transaction_count", async {
            provider.get_transaction_count(self.account).pending().await
        })
        .await
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        self.bounded("estimate_gas", async {
            provider.estimate_gas(tx.clone()).await
        })
        .await
    }

    async fn transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> Result<Option<ReceiptSummary>, GatewayError> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.clone());
        let receipt = self
            .bounded("get_transaction_receipt", async {
                provider.get_transaction_receipt(tx_hash).await
            })
            .await?;

        Ok(receipt.map(|receipt| ReceiptSummary {
            tx_hash,
            success: receipt.status(),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        }))
    }

    async fn submit(
        &self,
        tx: TransactionRequest,
        confirm_timeout: Duration,
    ) -> Result<ReceiptSummary, GatewayError> {
        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.rpc_url.clone());

        let submit_start = Instant::now();
        let pending = self
            .bounded("send_transaction", async {
                provider.send_transaction(tx).await
            })
            .await?;
        let tx_hash = *pending.tx_hash();

        debug!(
            tx_hash = %tx_hash,
            submit_ms = submit_start.elapsed().as_millis(),
            "Transaction submitted, waiting for confirmation"
        );

        let receipt = match tokio::time::timeout(confirm_timeout, pending.get_receipt()).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => return Err(GatewayError::Transport(e.to_string())),
            Err(_) => {
                return Err(GatewayError::ConfirmationTimeout {
                    tx_hash,
                    after: confirm_timeout,
                })
            }
        };

        Ok(ReceiptSummary {
            tx_hash,
            success: receipt.status(),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        })
    }
}

impl std::fmt::Debug for AlloyGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyGateway")
            .field("rpc_url", &redact_url(&self.rpc_url))
            .field("account", &self.account)
            .field("chain_id", &self.chain_id)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

/// Host-only form of an endpoint. Provider URLs often embed an API key in the path.
fn redact_url(url: &Url) -> String {
    format!("{}://{}", url.scheme(), url.host_str().unwrap_or("?"))
}
