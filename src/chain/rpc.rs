use std::{future::IntoFuture, time::Duration};

use alloy::{
    consensus::{transaction::SignerRecoverable, Transaction as _},
    eips::BlockNumberOrTag,
    primitives::{Address, B256, I256, U256},
    providers::{DynProvider, Provider, ProviderBuilder, WsConnect},
    rpc::types::Filter,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use log::info;
use moka::future::Cache;
use tokio::sync::broadcast::error::RecvError;
use url::Url;

use crate::{
    abis::{IAggregatorV3, IUniswapV3Pool, IERC20},
    chain::{
        ChainBlock, ChainLog, ChainReader, ChainTransaction, HeaderStream, PoolReader,
        PriceOracleReader,
    },
    config::ChainSettings,
};

/// Block timestamps kept in memory; token scans look up every block that emitted a log.
const TIMESTAMP_CACHE_CAPACITY: u64 = 10_000;

/// JSON-RPC access to one chain.
///
/// Requests go over HTTP; header subscriptions use the optional websocket endpoint.
/// Every call is bounded by the configured RPC timeout.
pub struct AlloyChain {
    name: String,
    provider: DynProvider,
    subscriber: Option<DynProvider>,
    timeout: Duration,
    block_timestamps: Cache<u64, u64>,
}

impl AlloyChain {
    /// Connects to the chain's endpoints and checks that they serve the configured chain id.
    pub async fn connect(settings: &ChainSettings, timeout: Duration) -> Result<Self> {
        let url = Url::parse(&settings.rpc_url)
            .with_context(|| format!("Invalid RPC URL for chain {}", settings.name))?;
        let provider = DynProvider::new(ProviderBuilder::new().connect_http(url));

        let subscriber = match &settings.ws_url {
            Some(ws_url) => {
                let ws = tokio::time::timeout(
                    timeout,
                    ProviderBuilder::new().connect_ws(WsConnect::new(ws_url.clone())),
                )
                .await
                .map_err(|_| anyhow!("Websocket connect to {} timed out", settings.name))?
                .with_context(|| format!("Failed to connect websocket for {}", settings.name))?;
                Some(DynProvider::new(ws))
            },
            None => None,
        };

        let chain = Self {
            name: settings.name.clone(),
            provider,
            subscriber,
            timeout,
            block_timestamps: Cache::builder()
                .max_capacity(TIMESTAMP_CACHE_CAPACITY)
                .build(),
        };

        let chain_id = chain
            .bounded("eth_chainId", chain.provider.get_chain_id())
            .await?;
        if chain_id != settings.chain_id {
            bail!(
                "RPC for {} serves chain id {}, expected {}",
                settings.name,
                chain_id,
                settings.chain_id
            );
        }

        info!("Connected to {} (chain id {})", settings.name, chain_id);
        Ok(chain)
    }

    async fn bounded<T, E>(
        &self,
        what: &str,
        call: impl IntoFuture<Output = Result<T, E>>,
    ) -> Result<T>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| anyhow!("{} on {} timed out after {:?}", what, self.name, self.timeout))?
            .with_context(|| format!("{} on {} failed", what, self.name))
    }
}

#[async_trait]
impl ChainReader for AlloyChain {
    async fn head_height(&self) -> Result<u64> {
        self.bounded("eth_blockNumber", self.provider.get_block_number())
            .await
    }

    async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock> {
        let block = self
            .bounded(
                "eth_getBlockByNumber",
                self.provider
                    .get_block_by_number(BlockNumberOrTag::Number(number))
                    .full(),
            )
            .await?
            .with_context(|| format!("Block {} not found on {}", number, self.name))?;

        if block.transactions.is_hashes() && !block.transactions.is_empty() {
            bail!("Node returned transaction hashes only for block {}", number);
        }

        let timestamp = block.header.timestamp;
        self.block_timestamps.insert(number, timestamp).await;

        let transactions = block
            .transactions
            .txns()
            .enumerate()
            .map(|(position, tx)| ChainTransaction {
                hash: *tx.inner.tx_hash(),
                position: position as u64,
                sender: tx.inner.inner().recover_signer().ok(),
                to: tx.to(),
                value: tx.value(),
            })
            .collect();

        Ok(ChainBlock {
            number,
            timestamp,
            transactions,
        })
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64> {
        if let Some(timestamp) = self.block_timestamps.get(&number).await {
            return Ok(timestamp);
        }

        let block = self
            .bounded(
                "eth_getBlockByNumber",
                self.provider
                    .get_block_by_number(BlockNumberOrTag::Number(number)),
            )
            .await?
            .with_context(|| format!("Block {} not found on {}", number, self.name))?;

        let timestamp = block.header.timestamp;
        self.block_timestamps.insert(number, timestamp).await;
        Ok(timestamp)
    }

    async fn filter_logs(
        &self,
        contract: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(topic)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .bounded("eth_getLogs", self.provider.get_logs(&filter))
            .await?;

        Ok(logs
            .into_iter()
            .map(|log| ChainLog {
                block_number: log.block_number,
                block_hash: log.block_hash,
                block_timestamp: log.block_timestamp,
                log_index: log.log_index,
                tx_hash: log.transaction_hash,
                topics: log.inner.data.topics().to_vec(),
                data: log.inner.data.data.clone(),
            })
            .collect())
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        let contract = IERC20::new(token, &self.provider);
        self.bounded("decimals", contract.decimals().call()).await
    }

    async fn subscribe_headers(&self) -> Result<HeaderStream> {
        let Some(subscriber) = &self.subscriber else {
            bail!("No websocket endpoint configured for {}", self.name);
        };

        let subscription = self
            .bounded("eth_subscribe(newHeads)", subscriber.subscribe_blocks())
            .await?;

        let stream = futures::stream::unfold(subscription, |mut subscription| async move {
            match subscription.recv().await {
                Ok(header) => Some((Ok(header.number), subscription)),
                Err(RecvError::Lagged(skipped)) => Some((
                    Err(anyhow!("header subscription lagged by {} messages", skipped)),
                    subscription,
                )),
                Err(RecvError::Closed) => None,
            }
        });

        Ok(stream.boxed())
    }
}

#[async_trait]
impl PriceOracleReader for AlloyChain {
    async fn latest_answer(&self, oracle: Address) -> Result<I256> {
        let feed = IAggregatorV3::new(oracle, &self.provider);
        let round = self
            .bounded("latestRoundData", feed.latestRoundData().call())
            .await?;
        Ok(round.answer)
    }
}

#[async_trait]
impl PoolReader for AlloyChain {
    async fn sqrt_price_x96(&self, pool: Address) -> Result<U256> {
        let pool = IUniswapV3Pool::new(pool, &self.provider);
        let slot0 = self.bounded("slot0", pool.slot0().call()).await?;
        Ok(U256::from(slot0.sqrtPriceX96))
    }
}
