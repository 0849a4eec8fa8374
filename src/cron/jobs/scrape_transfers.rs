//! Job to advance every enabled scrape task by one window.

use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use log::{error, info};

use crate::scraper::WindowScraper;

/// Ticks every enabled scraper once, concurrently. A failing task is logged and keeps
/// its checkpoint; it is retried on the next run.
pub async fn run(scrapers: &[Arc<WindowScraper>]) -> Result<()> {
    let start = std::time::Instant::now();

    let enabled: Vec<_> = scrapers.iter().filter(|s| s.task().enabled).collect();
    let results = join_all(enabled.iter().map(|scraper| scraper.tick())).await;

    let mut emitted = 0;
    for (scraper, result) in enabled.iter().zip(results) {
        match result {
            Ok(outcome) => emitted += outcome.emitted,
            Err(e) => error!("Scrape of {} failed: {:#}", scraper.task().label(), e),
        }
    }

    if emitted > 0 {
        info!(
            "Scraped {} new transfers across {} tasks in {:?}",
            emitted,
            enabled.len(),
            start.elapsed()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use alloy::primitives::Address;

    use super::*;
    use crate::{
        db::{CheckpointStore, MemoryStore},
        scraper::{AssetKind, ChainAssetTask},
        testing::FakeChain,
    };

    fn scraper(
        symbol: &str,
        enabled: bool,
        chain: Arc<FakeChain>,
        store: Arc<MemoryStore>,
    ) -> Arc<WindowScraper> {
        let task = ChainAssetTask {
            chain: "mainnet".to_string(),
            chain_id: 1,
            symbol: symbol.to_string(),
            kind: AssetKind::Token(Address::repeat_byte(0x70)),
            decimals: 18,
            enabled,
            scan_range: 5_000,
            overlap: 50,
            start_block: 0,
        };
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
    async fn test_only_enabled_tasks_advance() {
        let store = Arc::new(MemoryStore::new());
        store.set_u64("block_height_mainnet", 100).await.unwrap();

        let enabled_chain = Arc::new(FakeChain::new(100));
        let disabled_chain = Arc::new(FakeChain::new(100));

        run(&[
            scraper("SUPS", true, enabled_chain.clone(), store.clone()),
            scraper("OLD", false, disabled_chain.clone(), store.clone()),
        ])
        .await
        .unwrap();

        assert_eq!(store.value("last_block_mainnet_sups").await.unwrap(), "100");
        assert_eq!(enabled_chain.log_queries.load(Ordering::SeqCst), 1);
        assert_eq!(disabled_chain.log_queries.load(Ordering::SeqCst), 0);
        assert!(store.value("last_block_mainnet_old").await.is_none());
    }

    #[tokio::test]
    async fn test_failing_task_keeps_its_checkpoint() {
        let store = Arc::new(MemoryStore::new());
        store.set_u64("block_height_mainnet", 100).await.unwrap();

        let healthy = Arc::new(FakeChain::new(100));
        let broken = Arc::new(FakeChain::new(100));
        broken.set_failing(true);

        run(&[
            scraper("AAA", true, broken, store.clone()),
            scraper("BBB", true, healthy, store.clone()),
        ])
        .await
        .unwrap();

        assert_eq!(store.value("last_block_mainnet_aaa").await.unwrap(), "0");
        assert_eq!(store.value("last_block_mainnet_bbb").await.unwrap(), "100");
    }
}
