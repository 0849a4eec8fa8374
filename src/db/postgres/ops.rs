use alloy::primitives::{Address, B256, U256};
use anyhow::Context;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use log::error;

use crate::{
    db::{
        models::{PriceSnapshot, TransferRecord},
        postgres::PostgresClient,
        store::{CheckpointStore, PriceLedger, TransferLedger, Whitelist},
    },
    utils::hex_encode,
};

// ==================== CHECKPOINTS ====================

#[async_trait]
impl CheckpointStore for PostgresClient {
    /// Get-or-create in one statement. The no-op update makes `RETURNING` yield the
    /// existing value when the key is already present.
    async fn get(&self, key: &str, default: &str) -> anyhow::Result<String> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO pricefeed.kv (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET key = EXCLUDED.key
            RETURNING value
        "#;

        let row = client
            .query_one(query, &[&key, &default])
            .await
            .with_context(|| format!("Failed to read checkpoint {}", key))?;

        Ok(row.get("value"))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO pricefeed.kv (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = EXCLUDED.updated_at
        "#;

        client
            .execute(query, &[&key, &value])
            .await
            .map_err(|e| {
                error!("Failed to set checkpoint {}: {:?}", key, e);
                e
            })?;

        Ok(())
    }
}

// ==================== TRANSFERS ====================

#[async_trait]
impl TransferLedger for PostgresClient {
    async fn insert_transfer(&self, record: &TransferRecord) -> anyhow::Result<bool> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO pricefeed.transfers (
                block, log_index, chain_id, contract, symbol, decimals,
                tx_id, from_address, to_address, amount, timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::TEXT::NUMERIC, $11)
            ON CONFLICT (chain_id, tx_id, log_index) DO NOTHING
        "#;

        let inserted = client
            .execute(
                query,
                &[
                    &(record.block_number as i64),
                    &(record.log_index as i64),
                    &(record.chain_id as i64),
                    &hex_encode(record.contract.as_slice()),
                    &record.symbol,
                    &(record.decimals as i16),
                    &hex_encode(record.tx_hash.as_slice()),
                    &hex_encode(record.from_address.as_slice()),
                    &hex_encode(record.to_address.as_slice()),
                    &record.amount.to_string(),
                    &(record.timestamp as i64),
                ],
            )
            .await
            .map_err(|e| {
                error!(
                    "Failed to insert transfer {}:{} on chain {}: {:?}",
                    hex_encode(record.tx_hash.as_slice()),
                    record.log_index,
                    record.chain_id,
                    e
                );
                e
            })?;

        Ok(inserted == 1)
    }

    async fn transfers_since(
        &self,
        chain_id: u64,
        symbol: &str,
        since_block: u64,
    ) -> anyhow::Result<Vec<TransferRecord>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                block, log_index, chain_id, contract, symbol, decimals,
                tx_id, from_address, to_address, amount::TEXT AS amount, timestamp
            FROM pricefeed.transfers
            WHERE chain_id = $1 AND symbol = $2 AND block > $3
            ORDER BY block DESC, log_index DESC
        "#;

        let rows = client
            .query(
                query,
                &[
                    &(chain_id as i64),
                    &symbol.to_uppercase(),
                    &(since_block as i64),
                ],
            )
            .await?;

        rows.iter().map(row_to_transfer).collect()
    }
}

// ==================== PRICES ====================

#[async_trait]
impl PriceLedger for PostgresClient {
    async fn insert_price(&self, snapshot: &PriceSnapshot) -> anyhow::Result<()> {
        let client = self.pool.get().await?;
        let query = r#"
            INSERT INTO pricefeed.prices (
                created_at, token_price_cents, native_price_cents, reference_price_cents
            ) VALUES ($1, $2::TEXT::NUMERIC, $3::TEXT::NUMERIC, $4::TEXT::NUMERIC)
        "#;

        client
            .execute(
                query,
                &[
                    &snapshot.created_at,
                    &snapshot.token_usd_cents.to_string(),
                    &snapshot.native_usd_cents.to_string(),
                    &snapshot.reference_usd_cents.to_string(),
                ],
            )
            .await
            .map_err(|e| {
                error!("Failed to insert price snapshot: {:?}", e);
                e
            })?;

        Ok(())
    }

    async fn latest_price(&self) -> anyhow::Result<Option<PriceSnapshot>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                created_at,
                token_price_cents::TEXT AS token_price_cents,
                native_price_cents::TEXT AS native_price_cents,
                reference_price_cents::TEXT AS reference_price_cents
            FROM pricefeed.prices
            ORDER BY created_at DESC
            LIMIT 1
        "#;

        let Some(row) = client.query_opt(query, &[]).await? else {
            return Ok(None);
        };

        Ok(Some(PriceSnapshot {
            created_at: row.get("created_at"),
            token_usd_cents: parse_decimal(row.get("token_price_cents"))?,
            native_usd_cents: parse_decimal(row.get("native_price_cents"))?,
            reference_usd_cents: parse_decimal(row.get("reference_price_cents"))?,
        }))
    }
}

// ==================== WHITELIST ====================

#[async_trait]
impl Whitelist for PostgresClient {
    async fn whitelisted_addresses(&self, chain_id: u64) -> anyhow::Result<Vec<Address>> {
        let client = self.pool.get().await?;
        let query = "SELECT address FROM pricefeed.whitelisted_addresses WHERE chain_id = $1";

        let rows = client.query(query, &[&(chain_id as i64)]).await?;

        rows.iter()
            .map(|row| {
                let address: String = row.get("address");
                address
                    .parse::<Address>()
                    .with_context(|| format!("Invalid whitelisted address '{}'", address))
            })
            .collect()
    }
}

fn parse_decimal(value: String) -> anyhow::Result<BigDecimal> {
    value
        .parse::<BigDecimal>()
        .with_context(|| format!("Invalid decimal '{}'", value))
}

fn row_to_transfer(row: &tokio_postgres::Row) -> anyhow::Result<TransferRecord> {
    let contract: String = row.get("contract");
    let tx_id: String = row.get("tx_id");
    let from_address: String = row.get("from_address");
    let to_address: String = row.get("to_address");
    let amount: String = row.get("amount");
    let block: i64 = row.get("block");
    let log_index: i64 = row.get("log_index");
    let chain_id: i64 = row.get("chain_id");
    let decimals: i16 = row.get("decimals");
    let timestamp: i64 = row.get("timestamp");

    Ok(TransferRecord {
        block_number: block as u64,
        log_index: log_index as u64,
        chain_id: chain_id as u64,
        contract: contract.parse::<Address>()?,
        symbol: row.get("symbol"),
        decimals: decimals as u8,
        tx_hash: tx_id.parse::<B256>()?,
        from_address: from_address.parse::<Address>()?,
        to_address: to_address.parse::<Address>()?,
        amount: U256::from_str_radix(&amount, 10)
            .with_context(|| format!("Invalid transfer amount '{}'", amount))?,
        timestamp: timestamp as u64,
    })
}
