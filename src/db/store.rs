//! Storage contracts consumed by the scraping and pricing pipeline.
//!
//! Components receive these as `Arc<dyn ...>` handles so PostgreSQL and the in-memory
//! store are interchangeable.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::db::models::{PriceSnapshot, TransferRecord};

/// Durable key -> string mapping with get-or-initialize reads.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Returns the stored value, first creating the key with `default` if it is absent.
    /// Creation must be atomic: concurrent first reads of one key must not fail.
    async fn get(&self, key: &str, default: &str) -> Result<String>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn get_u64(&self, key: &str, default: u64) -> Result<u64> {
        let value = self.get(key, &default.to_string()).await?;
        value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Checkpoint {} holds non-numeric value '{}'", key, value))
    }

    async fn set_u64(&self, key: &str, value: u64) -> Result<()> {
        self.set(key, &value.to_string()).await
    }
}

/// Append-only transfer history.
#[async_trait]
pub trait TransferLedger: Send + Sync {
    /// Inserts a transfer. Returns `false` when a row with the same
    /// `(chain_id, tx_hash, log_index)` already exists.
    async fn insert_transfer(&self, record: &TransferRecord) -> Result<bool>;

    /// Transfers of `symbol` on `chain_id` in blocks after `since_block`, newest block first.
    async fn transfers_since(
        &self,
        chain_id: u64,
        symbol: &str,
        since_block: u64,
    ) -> Result<Vec<TransferRecord>>;
}

/// Append-only price history.
#[async_trait]
pub trait PriceLedger: Send + Sync {
    async fn insert_price(&self, snapshot: &PriceSnapshot) -> Result<()>;

    async fn latest_price(&self) -> Result<Option<PriceSnapshot>>;
}

/// Recipients whose incoming native transfers are recorded.
#[async_trait]
pub trait Whitelist: Send + Sync {
    async fn whitelisted_addresses(&self, chain_id: u64) -> Result<Vec<Address>>;
}
