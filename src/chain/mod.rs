//! Chain query capabilities.
//!
//! Components depend on the narrowest trait they need: scrapers and head trackers on
//! [`ChainReader`], the price aggregator on [`PriceOracleReader`] and [`PoolReader`].
//! [`AlloyChain`] implements all three over JSON-RPC for one chain.

use alloy::primitives::{Address, Bytes, B256, I256, U256};
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

mod rpc;

pub use rpc::AlloyChain;

/// A transaction as seen by the native-asset scanner.
#[derive(Debug, Clone)]
pub struct ChainTransaction {
    pub hash: B256,
    /// Position within the block.
    pub position: u64,
    /// Recovered signer. `None` when the signature could not be recovered.
    pub sender: Option<Address>,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
}

#[derive(Debug, Clone)]
pub struct ChainBlock {
    pub number: u64,
    pub timestamp: u64,
    pub transactions: Vec<ChainTransaction>,
}

/// An event log returned by a log filter.
///
/// Position fields are optional because nodes omit them for pending logs.
#[derive(Debug, Clone)]
pub struct ChainLog {
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
    pub block_timestamp: Option<u64>,
    pub log_index: Option<u64>,
    pub tx_hash: Option<B256>,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// New block heights. An `Err` item is a transient stream error; the stream stays open.
/// The stream ending means the subscription was closed.
pub type HeaderStream = BoxStream<'static, Result<u64>>;

/// Read access to one chain.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn head_height(&self) -> Result<u64>;

    async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock>;

    async fn block_timestamp(&self, number: u64) -> Result<u64>;

    /// Logs emitted by `contract` with first topic `topic` in `[from_block, to_block]`.
    async fn filter_logs(
        &self,
        contract: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>>;

    async fn token_decimals(&self, token: Address) -> Result<u8>;

    async fn subscribe_headers(&self) -> Result<HeaderStream>;
}

/// Chainlink-style `latestRoundData` feeds.
#[async_trait]
pub trait PriceOracleReader: Send + Sync {
    /// The raw fixed-point answer of the latest round.
    async fn latest_answer(&self, oracle: Address) -> Result<I256>;
}

/// Uniswap V3 style pools.
#[async_trait]
pub trait PoolReader: Send + Sync {
    async fn sqrt_price_x96(&self, pool: Address) -> Result<U256>;
}
