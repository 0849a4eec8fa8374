//! In-process fakes of the chain capabilities for unit tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
};

use alloy::{
    primitives::{Address, Bytes, B256, I256, U256},
    sol_types::SolEvent,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use futures::StreamExt;

use crate::{
    abis::Transfer,
    chain::{
        ChainBlock, ChainLog, ChainReader, ChainTransaction, HeaderStream, PoolReader,
        PriceOracleReader,
    },
};

/// Scripted chain. Blocks that were never added are empty.
#[derive(Default)]
pub struct FakeChain {
    head: AtomicU64,
    blocks: Mutex<HashMap<u64, ChainBlock>>,
    logs: Mutex<HashMap<Address, Vec<ChainLog>>>,
    decimals: Mutex<HashMap<Address, u8>>,
    subscriptions: Mutex<VecDeque<Vec<Result<u64>>>>,
    failing: AtomicBool,
    pub block_fetches: AtomicUsize,
    pub log_queries: AtomicUsize,
}

impl FakeChain {
    pub fn new(head: u64) -> Self {
        let chain = Self::default();
        chain.set_head(head);
        chain
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    /// Every call fails while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn add_block(&self, number: u64, timestamp: u64, transactions: Vec<ChainTransaction>) {
        self.blocks.lock().unwrap().insert(
            number,
            ChainBlock {
                number,
                timestamp,
                transactions,
            },
        );
    }

    pub fn add_log(&self, contract: Address, log: ChainLog) {
        self.logs
            .lock()
            .unwrap()
            .entry(contract)
            .or_default()
            .push(log);
    }

    pub fn set_decimals(&self, token: Address, decimals: u8) {
        self.decimals.lock().unwrap().insert(token, decimals);
    }

    /// Queue the items one `subscribe_headers` call will yield before its stream closes.
    pub fn push_subscription(&self, items: Vec<Result<u64>>) {
        self.subscriptions.lock().unwrap().push_back(items);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("rpc unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn head_height(&self) -> Result<u64> {
        self.check()?;
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock> {
        self.check()?;
        self.block_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .unwrap_or(ChainBlock {
                number,
                timestamp: 1_600_000_000 + number,
                transactions: vec![],
            }))
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64> {
        self.check()?;
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(&number)
            .map(|block| block.timestamp)
            .unwrap_or(1_600_000_000 + number))
    }

    async fn filter_logs(
        &self,
        contract: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ChainLog>> {
        self.check()?;
        self.log_queries.fetch_add(1, Ordering::SeqCst);
        let logs = self.logs.lock().unwrap();
        Ok(logs
            .get(&contract)
            .map(|logs| {
                logs.iter()
                    .filter(|log| log.topics.first() == Some(&topic))
                    .filter(|log| {
                        log.block_number
                            .is_some_and(|block| block >= from_block && block <= to_block)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        self.check()?;
        self.decimals
            .lock()
            .unwrap()
            .get(&token)
            .copied()
            .ok_or_else(|| anyhow!("no decimals for {}", token))
    }

    async fn subscribe_headers(&self) -> Result<HeaderStream> {
        self.check()?;
        let items = self
            .subscriptions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("subscription refused"))?;
        Ok(futures::stream::iter(items).boxed())
    }
}

/// Fixed oracle answers and pool prices.
#[derive(Default)]
pub struct FakePrices {
    answers: Mutex<HashMap<Address, I256>>,
    pools: Mutex<HashMap<Address, U256>>,
}

impl FakePrices {
    pub fn set_answer(&self, oracle: Address, answer: i64) {
        self.answers
            .lock()
            .unwrap()
            .insert(oracle, I256::try_from(answer).unwrap());
    }

    pub fn set_sqrt_price(&self, pool: Address, sqrt_price_x96: U256) {
        self.pools.lock().unwrap().insert(pool, sqrt_price_x96);
    }
}

#[async_trait]
impl PriceOracleReader for FakePrices {
    async fn latest_answer(&self, oracle: Address) -> Result<I256> {
        self.answers
            .lock()
            .unwrap()
            .get(&oracle)
            .copied()
            .ok_or_else(|| anyhow!("unknown oracle {}", oracle))
    }
}

#[async_trait]
impl PoolReader for FakePrices {
    async fn sqrt_price_x96(&self, pool: Address) -> Result<U256> {
        self.pools
            .lock()
            .unwrap()
            .get(&pool)
            .copied()
            .ok_or_else(|| anyhow!("unknown pool {}", pool))
    }
}

pub fn native_tx(position: u64, from: Address, to: Address, value: u64) -> ChainTransaction {
    ChainTransaction {
        hash: B256::with_last_byte(position as u8 + 1),
        position,
        sender: Some(from),
        to: Some(to),
        value: U256::from(value),
    }
}

/// An encoded `Transfer` log as a node would return it.
pub fn transfer_log(
    block_number: u64,
    log_index: u64,
    from: Address,
    to: Address,
    value: u64,
) -> ChainLog {
    let event = Transfer {
        from,
        to,
        value: U256::from(value),
    };
    let data = event.encode_log_data();
    ChainLog {
        block_number: Some(block_number),
        block_hash: Some(B256::with_last_byte(block_number as u8)),
        block_timestamp: None,
        log_index: Some(log_index),
        tx_hash: Some(B256::left_padding_from(&block_number.to_be_bytes())),
        topics: data.topics().to_vec(),
        data: data.data,
    }
}

/// A log carrying the `Transfer` topic whose body does not decode.
pub fn malformed_transfer_log(block_number: u64, log_index: u64) -> ChainLog {
    ChainLog {
        block_number: Some(block_number),
        block_hash: None,
        block_timestamp: None,
        log_index: Some(log_index),
        tx_hash: Some(B256::repeat_byte(0xee)),
        topics: vec![Transfer::SIGNATURE_HASH],
        data: Bytes::from_static(&[0x01, 0x02]),
    }
}
