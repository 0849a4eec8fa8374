use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use bigdecimal::BigDecimal;
use log::{info, warn};
use num_traits::Zero;

use crate::{
    chain::{PoolReader, PriceOracleReader},
    config::{parse_address, PriceSettings},
    db::{models::PriceSnapshot, store::PriceLedger},
    utils::{
        apply_zero_price_fallback, derive_token_price, oracle_answer_to_price,
        sqrt_price_x96_to_price,
    },
};

/// Computes USD prices from on-chain oracles and the token's liquidity pool.
///
/// Live reads and persisted snapshots share one derivation.
pub struct PriceAggregator {
    oracles: Arc<dyn PriceOracleReader>,
    pools: Arc<dyn PoolReader>,
    ledger: Arc<dyn PriceLedger>,
    primary_oracle: Address,
    reference_oracle: Address,
    pool: Address,
    fallback_token_cents: BigDecimal,
}

impl PriceAggregator {
    pub fn new(
        settings: &PriceSettings,
        oracles: Arc<dyn PriceOracleReader>,
        pools: Arc<dyn PoolReader>,
        ledger: Arc<dyn PriceLedger>,
    ) -> Result<Self> {
        Ok(Self {
            oracles,
            pools,
            ledger,
            primary_oracle: parse_address(&settings.primary_oracle)?,
            reference_oracle: parse_address(&settings.reference_oracle)?,
            pool: parse_address(&settings.pool)?,
            fallback_token_cents: settings
                .fallback_token_cents
                .parse::<BigDecimal>()
                .context("Invalid fallback token price")?,
        })
    }

    /// Primary chain native asset, in cents.
    pub async fn native_usd_cents(&self) -> Result<BigDecimal> {
        let answer = self
            .oracles
            .latest_answer(self.primary_oracle)
            .await
            .context("Failed to read primary oracle")?;
        Ok(oracle_answer_to_price(answer))
    }

    /// Reference asset, in cents.
    pub async fn reference_usd_cents(&self) -> Result<BigDecimal> {
        let answer = self
            .oracles
            .latest_answer(self.reference_oracle)
            .await
            .context("Failed to read reference oracle")?;
        Ok(oracle_answer_to_price(answer))
    }

    /// Secondary token in cents, priced against the native asset through the pool.
    pub async fn token_usd_cents(&self, native_usd_cents: &BigDecimal) -> Result<BigDecimal> {
        let sqrt_price_x96 = self
            .pools
            .sqrt_price_x96(self.pool)
            .await
            .context("Failed to read pool price")?;

        let pool_price = sqrt_price_x96_to_price(sqrt_price_x96);
        let derived = derive_token_price(native_usd_cents, &pool_price);
        if derived.is_zero() {
            warn!(
                "Derived token price is zero, using fallback of {} cents",
                self.fallback_token_cents
            );
        }

        Ok(apply_zero_price_fallback(derived, &self.fallback_token_cents))
    }

    /// Current prices without persisting them.
    pub async fn live_prices(&self) -> Result<PriceSnapshot> {
        let (native, reference) =
            tokio::try_join!(self.native_usd_cents(), self.reference_usd_cents())?;
        let token = self.token_usd_cents(&native).await?;

        Ok(PriceSnapshot::new(token, native, reference))
    }

    /// Current prices, appended to the price ledger.
    pub async fn snapshot(&self) -> Result<PriceSnapshot> {
        let snapshot = self.live_prices().await?;
        self.ledger.insert_price(&snapshot).await?;

        info!(
            "Price snapshot: token {}c, native {}c, reference {}c",
            snapshot.token_usd_cents, snapshot.native_usd_cents, snapshot.reference_usd_cents
        );
        Ok(snapshot)
    }

    /// Most recent persisted snapshot.
    pub async fn latest(&self) -> Result<Option<PriceSnapshot>> {
        self.ledger.latest_price().await
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use alloy::primitives::U256;

    use super::*;
    use crate::{db::MemoryStore, testing::FakePrices};

    const PRIMARY: &str = "0x5f4eC3Df9cbd43714FE2740f5E3616155c5b8419";
    const REFERENCE: &str = "0x14e613ac84a31f709eadbdf89c6cc390fdc9540a";
    const POOL: &str = "0xa1e5dc01359c2920c096f0091fc7f0bf69812ca7";

    fn settings() -> PriceSettings {
        PriceSettings {
            chain: "mainnet".to_string(),
            primary_oracle: PRIMARY.to_string(),
            reference_oracle: REFERENCE.to_string(),
            pool: POOL.to_string(),
            fallback_token_cents: "80".to_string(),
        }
    }

    fn aggregator(prices: Arc<FakePrices>, store: Arc<MemoryStore>) -> PriceAggregator {
        PriceAggregator::new(&settings(), prices.clone(), prices, store).unwrap()
    }

    fn address(value: &str) -> Address {
        parse_address(value).unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_derives_and_persists() {
        let prices = Arc::new(FakePrices::default());
        prices.set_answer(address(PRIMARY), 350_000_000_000);
        prices.set_answer(address(REFERENCE), 60_000_000);
        // price of 4 native per token
        prices.set_sqrt_price(address(POOL), U256::from(2u64) << 96);

        let store = Arc::new(MemoryStore::new());
        let aggregator = aggregator(prices, store.clone());

        let snapshot = aggregator.snapshot().await.unwrap();
        assert_eq!(snapshot.native_usd_cents, BigDecimal::from_str("350000").unwrap());
        assert_eq!(snapshot.reference_usd_cents, BigDecimal::from_str("60").unwrap());
        assert_eq!(snapshot.token_usd_cents, BigDecimal::from_str("87500").unwrap());

        assert_eq!(store.prices().await.len(), 1);
        assert_eq!(aggregator.latest().await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_empty_pool_uses_fallback() {
        let prices = Arc::new(FakePrices::default());
        prices.set_answer(address(PRIMARY), 350_000_000_000);
        prices.set_answer(address(REFERENCE), 60_000_000);
        prices.set_sqrt_price(address(POOL), U256::ZERO);

        let aggregator = aggregator(prices, Arc::new(MemoryStore::new()));

        let live = aggregator.live_prices().await.unwrap();
        assert_eq!(live.token_usd_cents, BigDecimal::from(80));
        assert_eq!(live.native_usd_cents, BigDecimal::from_str("350000").unwrap());
    }

    #[tokio::test]
    async fn test_tiny_token_price_is_kept() {
        let prices = Arc::new(FakePrices::default());
        prices.set_answer(address(PRIMARY), 350_000_000_000);
        prices.set_answer(address(REFERENCE), 60_000_000);
        prices.set_sqrt_price(address(POOL), U256::from(1u64) << 159);

        let aggregator = aggregator(prices, Arc::new(MemoryStore::new()));

        let live = aggregator.live_prices().await.unwrap();
        assert!(!live.token_usd_cents.is_zero());
        assert!(live.token_usd_cents < BigDecimal::from(1));
    }

    #[tokio::test]
    async fn test_zero_oracle_answer_is_not_replaced() {
        let prices = Arc::new(FakePrices::default());
        prices.set_answer(address(PRIMARY), 350_000_000_000);
        prices.set_answer(address(REFERENCE), 0);
        prices.set_sqrt_price(address(POOL), U256::from(1u64) << 96);

        let aggregator = aggregator(prices, Arc::new(MemoryStore::new()));

        let live = aggregator.live_prices().await.unwrap();
        assert!(live.reference_usd_cents.is_zero());
    }

    #[tokio::test]
    async fn test_oracle_failure_persists_nothing() {
        let prices = Arc::new(FakePrices::default());
        prices.set_answer(address(PRIMARY), 350_000_000_000);
        prices.set_sqrt_price(address(POOL), U256::from(1u64) << 96);

        let store = Arc::new(MemoryStore::new());
        let aggregator = aggregator(prices, store.clone());

        assert!(aggregator.snapshot().await.is_err());
        assert!(store.prices().await.is_empty());
        assert_eq!(aggregator.latest().await.unwrap(), None);
    }
}
