use std::{sync::Arc, time::Duration};

use anyhow::Result;
use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    chain::ChainReader,
    config::HeadMode,
    db::{models::CheckpointKey, store::CheckpointStore},
    scraper::WindowScraper,
};

/// Delay before re-subscribing after a subscription failed or closed.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Keeps one chain's stored head height current.
///
/// Polling goes through [`refresh`](Self::refresh). In subscribe mode
/// [`run_subscription`](Self::run_subscription) additionally records every new header
/// and can tick the chain's scrapers on arrival.
pub struct HeadTracker {
    chain: String,
    mode: HeadMode,
    reader: Arc<dyn ChainReader>,
    checkpoints: Arc<dyn CheckpointStore>,
    scrapers: Vec<Arc<WindowScraper>>,
    resubscribe_delay: Duration,
    /// Serializes the read-compare-write in [`record`](Self::record).
    record_guard: Mutex<()>,
}

impl HeadTracker {
    pub fn new(
        chain: impl Into<String>,
        mode: HeadMode,
        reader: Arc<dyn ChainReader>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            chain: chain.into(),
            mode,
            reader,
            checkpoints,
            scrapers: Vec::new(),
            resubscribe_delay: RESUBSCRIBE_DELAY,
            record_guard: Mutex::new(()),
        }
    }

    /// Scrapers ticked on every new header.
    pub fn with_scrapers(mut self, scrapers: Vec<Arc<WindowScraper>>) -> Self {
        self.scrapers = scrapers;
        self
    }

    pub fn with_resubscribe_delay(mut self, delay: Duration) -> Self {
        self.resubscribe_delay = delay;
        self
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn mode(&self) -> HeadMode {
        self.mode
    }

    /// Queries the head height and records it.
    pub async fn refresh(&self) -> Result<u64> {
        let height = self.reader.head_height().await?;
        self.record(height).await
    }

    /// Stores `height` unless a higher one is already stored. Returns the stored height.
    ///
    /// Polling and the header subscription both record the same chain, so concurrent
    /// calls are serialized.
    pub async fn record(&self, height: u64) -> Result<u64> {
        let _guard = self.record_guard.lock().await;
        let key = CheckpointKey::block_height(&self.chain);
        let stored = self.checkpoints.get_u64(&key, 0).await?;

        if height < stored {
            debug!(
                "Ignoring head {} on {}, already at {}",
                height, self.chain, stored
            );
            return Ok(stored);
        }

        if height > stored {
            self.checkpoints.set_u64(&key, height).await?;
        }
        Ok(height)
    }

    /// Follows new headers until cancelled. Stream errors are logged and the stream is
    /// kept; a failed or closed subscription is re-established after a delay.
    pub async fn run_subscription(&self, cancellation_token: CancellationToken) {
        info!("Following new headers on {}", self.chain);

        'subscription: loop {
            let subscribed = tokio::select! {
                _ = cancellation_token.cancelled() => break 'subscription,
                subscribed = self.reader.subscribe_headers() => subscribed,
            };

            match subscribed {
                Ok(mut headers) => loop {
                    let next = tokio::select! {
                        _ = cancellation_token.cancelled() => break 'subscription,
                        next = headers.next() => next,
                    };

                    match next {
                        Some(Ok(height)) => self.on_header(height).await,
                        Some(Err(e)) => warn!("Header stream error on {}: {:#}", self.chain, e),
                        None => {
                            warn!("Header subscription on {} closed", self.chain);
                            break;
                        },
                    }
                },
                Err(e) => error!("Failed to subscribe to headers on {}: {:#}", self.chain, e),
            }

            tokio::select! {
                _ = cancellation_token.cancelled() => break 'subscription,
                _ = tokio::time::sleep(self.resubscribe_delay) => {},
            }
        }

        info!("Stopped following headers on {}", self.chain);
    }

    async fn on_header(&self, height: u64) {
        if let Err(e) = self.record(height).await {
            error!("Failed to record head {} on {}: {:#}", height, self.chain, e);
            return;
        }

        for scraper in self.scrapers.iter().filter(|s| s.task().enabled) {
            match scraper.try_tick().await {
                Some(Ok(outcome)) if outcome.emitted > 0 => info!(
                    "{}: {} new transfers up to block {}",
                    scraper.task().label(),
                    outcome.emitted,
                    outcome.last_scraped
                ),
                Some(Ok(_)) => {},
                Some(Err(e)) => error!("Scrape of {} failed: {:#}", scraper.task().label(), e),
                None => debug!(
                    "{} already scraping, skipping header {}",
                    scraper.task().label(),
                    height
                ),
            }
        }
    }
}
