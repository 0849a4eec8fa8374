use std::collections::HashMap;

use alloy::primitives::{Address, B256};
use anyhow::Result;
use async_trait::async_trait;
use rustc_hash::FxHashSet;
use tokio::sync::RwLock;

use crate::db::{
    models::{PriceSnapshot, TransferRecord},
    store::{CheckpointStore, PriceLedger, TransferLedger, Whitelist},
};

/// In-process implementation of every storage contract.
///
/// Enforces the same transfer identity constraint as the PostgreSQL schema. Nothing is
/// persisted across restarts.
#[derive(Default)]
pub struct MemoryStore {
    kv: RwLock<HashMap<String, String>>,
    transfers: RwLock<Vec<TransferRecord>>,
    transfer_ids: RwLock<FxHashSet<(u64, B256, u64)>>,
    prices: RwLock<Vec<PriceSnapshot>>,
    whitelist: RwLock<HashMap<u64, Vec<Address>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_whitelisted(&self, chain_id: u64, address: Address) {
        self.whitelist
            .write()
            .await
            .entry(chain_id)
            .or_default()
            .push(address);
    }

    /// Every stored transfer, in insertion order.
    pub async fn transfers(&self) -> Vec<TransferRecord> {
        self.transfers.read().await.clone()
    }

    pub async fn prices(&self) -> Vec<PriceSnapshot> {
        self.prices.read().await.clone()
    }

    pub async fn value(&self, key: &str) -> Option<String> {
        self.kv.read().await.get(key).cloned()
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn get(&self, key: &str, default: &str) -> Result<String> {
        let mut kv = self.kv.write().await;
        Ok(kv
            .entry(key.to_string())
            .or_insert_with(|| default.to_string())
            .clone())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.kv
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[async_trait]
impl TransferLedger for MemoryStore {
    async fn insert_transfer(&self, record: &TransferRecord) -> Result<bool> {
        let id = (record.chain_id, record.tx_hash, record.log_index);
        if !self.transfer_ids.write().await.insert(id) {
            return Ok(false);
        }
        self.transfers.write().await.push(record.clone());
        Ok(true)
    }

    async fn transfers_since(
        &self,
        chain_id: u64,
        symbol: &str,
        since_block: u64,
    ) -> Result<Vec<TransferRecord>> {
        let symbol = symbol.to_uppercase();
        let mut result: Vec<TransferRecord> = self
            .transfers
            .read()
            .await
            .iter()
            .filter(|t| {
                t.chain_id == chain_id && t.symbol == symbol && t.block_number > since_block
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            b.block_number
                .cmp(&a.block_number)
                .then(b.log_index.cmp(&a.log_index))
        });
        Ok(result)
    }
}

#[async_trait]
impl PriceLedger for MemoryStore {
    async fn insert_price(&self, snapshot: &PriceSnapshot) -> Result<()> {
        self.prices.write().await.push(snapshot.clone());
        Ok(())
    }

    async fn latest_price(&self) -> Result<Option<PriceSnapshot>> {
        Ok(self.prices.read().await.last().cloned())
    }
}

#[async_trait]
impl Whitelist for MemoryStore {
    async fn whitelisted_addresses(&self, chain_id: u64) -> Result<Vec<Address>> {
        Ok(self
            .whitelist
            .read()
            .await
            .get(&chain_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;

    fn transfer(block: u64, log_index: u64, symbol: &str) -> TransferRecord {
        TransferRecord {
            block_number: block,
            log_index,
            chain_id: 1,
            contract: Address::ZERO,
            symbol: symbol.to_string(),
            decimals: 18,
            tx_hash: B256::with_last_byte(block as u8),
            from_address: Address::ZERO,
            to_address: Address::ZERO,
            amount: U256::from(1u64),
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_get_initializes_once() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k", "10").await.unwrap(), "10");
        assert_eq!(store.get("k", "20").await.unwrap(), "10");
        store.set_u64("k", 30).await.unwrap();
        assert_eq!(store.get_u64("k", 0).await.unwrap(), 30);
    }

    #[tokio::test]
    async fn test_non_numeric_checkpoint_is_an_error() {
        let store = MemoryStore::new();
        store.set("k", "abc").await.unwrap();
        assert!(store.get_u64("k", 0).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_transfer_is_ignored() {
        let store = MemoryStore::new();
        assert!(store.insert_transfer(&transfer(5, 0, "ETH")).await.unwrap());
        assert!(!store.insert_transfer(&transfer(5, 0, "ETH")).await.unwrap());
        assert!(store.insert_transfer(&transfer(5, 1, "ETH")).await.unwrap());
        assert_eq!(store.transfers().await.len(), 2);
    }

    #[tokio::test]
    async fn test_transfers_since_is_newest_first() {
        let store = MemoryStore::new();
        for block in [3, 9, 6, 1] {
            store.insert_transfer(&transfer(block, 0, "SUPS")).await.unwrap();
        }
        store.insert_transfer(&transfer(7, 0, "ETH")).await.unwrap();

        let blocks: Vec<u64> = store
            .transfers_since(1, "sups", 2)
            .await
            .unwrap()
            .iter()
            .map(|t| t.block_number)
            .collect();
        assert_eq!(blocks, vec![9, 6, 3]);
    }
}
