use std::{sync::Arc, time::Instant};

use anyhow::Result;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::scraper::WindowScraper;

/// Drives every enabled scraper to the chain head.
///
/// Each task runs in its own worker. A failing worker is logged and stops alone; the
/// others keep going.
pub struct CatchUpCoordinator {
    scrapers: Vec<Arc<WindowScraper>>,
}

/// Progress made by one catch-up worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatchUpReport {
    pub invocations: usize,
    pub emitted: usize,
    pub last_scraped: u64,
}

impl CatchUpCoordinator {
    pub fn new(scrapers: Vec<Arc<WindowScraper>>) -> Self {
        Self { scrapers }
    }

    /// Waits for every worker to reach the head, fail or be cancelled.
    pub async fn run(&self, cancellation_token: &CancellationToken) -> Result<()> {
        let start = Instant::now();

        let workers: Vec<_> = self
            .scrapers
            .iter()
            .filter(|scraper| scraper.task().enabled)
            .cloned()
            .map(|scraper| {
                let token = cancellation_token.clone();
                let label = scraper.task().label();
                let handle = tokio::spawn(async move { catch_up(&scraper, &token).await });
                (label, handle)
            })
            .collect();

        info!("Catching up {} scrape tasks", workers.len());

        for (label, handle) in workers {
            match handle.await {
                Ok(Ok(report)) => info!(
                    "{} caught up at block {} after {} windows ({} new transfers)",
                    label, report.last_scraped, report.invocations, report.emitted
                ),
                Ok(Err(e)) => error!("Catch-up for {} failed: {:#}", label, e),
                Err(e) => error!("Catch-up worker for {} panicked: {}", label, e),
            }
        }

        info!("Catch-up finished in {:?}", start.elapsed());
        Ok(())
    }
}

/// Ticks until the checkpoint reaches the head. Both are re-read on every tick, so a
/// head that keeps moving is followed.
pub async fn catch_up(
    scraper: &WindowScraper,
    cancellation_token: &CancellationToken,
) -> Result<CatchUpReport> {
    let mut report = CatchUpReport::default();

    while !cancellation_token.is_cancelled() {
        let outcome = scraper.tick().await?;
        report.invocations += 1;
        report.emitted += outcome.emitted;
        report.last_scraped = outcome.last_scraped;

        if outcome.caught_up() {
            break;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::Address;

    use super::*;
    use crate::{
        db::{CheckpointStore, MemoryStore},
        scraper::{AssetKind, ChainAssetTask},
        testing::FakeChain,
    };

    fn token_task(symbol: &str, byte: u8, enabled: bool) -> ChainAssetTask {
        ChainAssetTask {
            chain: "mainnet".to_string(),
            chain_id: 1,
            symbol: symbol.to_string(),
            kind: AssetKind::Token(Address::repeat_byte(byte)),
            decimals: 18,
            enabled,
            scan_range: 5_000,
            overlap: 50,
            start_block: 0,
        }
    }

    fn scraper(
        task: ChainAssetTask,
        chain: Arc<FakeChain>,
        store: Arc<MemoryStore>,
    ) -> Arc<WindowScraper> {
        Arc::new(WindowScraper::new(
            task,
            chain,
            store.clone(),
            store.clone(),
            store,
            vec![],
        ))
    }

    #[tokio::test]
    async fn test_catch_up_takes_three_windows() {
        let chain = Arc::new(FakeChain::new(12_000));
        let store = Arc::new(MemoryStore::new());
        store.set_u64("block_height_mainnet", 12_000).await.unwrap();

        let scraper = scraper(token_task("SUPS", 0x70, true), chain.clone(), store.clone());
        let report = catch_up(&scraper, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.invocations, 3);
        assert_eq!(report.last_scraped, 12_000);
        assert_eq!(chain.log_queries.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert_eq!(store.value("last_block_mainnet_sups").await.unwrap(), "12000");
    }

    #[tokio::test]
    async fn test_failing_task_does_not_block_others() {
        let healthy = Arc::new(FakeChain::new(12_000));
        let broken = Arc::new(FakeChain::new(12_000));
        broken.set_failing(true);

        let store = Arc::new(MemoryStore::new());
        store.set_u64("block_height_mainnet", 12_000).await.unwrap();

        let coordinator = CatchUpCoordinator::new(vec![
            scraper(token_task("AAA", 0x01, true), healthy.clone(), store.clone()),
            scraper(token_task("BBB", 0x02, true), broken, store.clone()),
            scraper(token_task("CCC", 0x03, true), healthy.clone(), store.clone()),
            scraper(token_task("DDD", 0x04, true), healthy, store.clone()),
        ]);

        coordinator.run(&CancellationToken::new()).await.unwrap();

        for symbol in ["aaa", "ccc", "ddd"] {
            let key = format!("last_block_mainnet_{}", symbol);
            assert_eq!(store.value(&key).await.unwrap(), "12000");
        }
        assert_eq!(store.value("last_block_mainnet_bbb").await.unwrap(), "0");
    }

    #[tokio::test]
    async fn test_disabled_tasks_are_skipped() {
        let chain = Arc::new(FakeChain::new(100));
        let store = Arc::new(MemoryStore::new());
        store.set_u64("block_height_mainnet", 100).await.unwrap();

        let coordinator = CatchUpCoordinator::new(vec![scraper(
            token_task("SUPS", 0x70, false),
            chain.clone(),
            store.clone(),
        )]);
        coordinator.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(chain.log_queries.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(store.value("last_block_mainnet_sups").await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_catch_up_stops() {
        let chain = Arc::new(FakeChain::new(1_000_000));
        let store = Arc::new(MemoryStore::new());
        store.set_u64("block_height_mainnet", 1_000_000).await.unwrap();

        let token = CancellationToken::new();
        token.cancel();

        let scraper = scraper(token_task("SUPS", 0x70, true), chain, store);
        let report = catch_up(&scraper, &token).await.unwrap();
        assert_eq!(report.invocations, 0);
    }
}
