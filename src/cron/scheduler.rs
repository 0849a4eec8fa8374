//! Scheduler for the ingestion cadences.
//!
//! Runs:
//! - Head refresh for every chain (fast cadence)
//! - One incremental scrape per enabled task (medium cadence)
//! - Price snapshots (slow cadence)
//!
//! Header subscriptions run beside the cadences as their own tasks.

use std::{future::Future, sync::Arc, time::Duration};

use anyhow::Result;
use log::{error, info};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{
    config::{HeadMode, SchedulerSettings},
    prices::PriceAggregator,
    scraper::{CatchUpCoordinator, HeadTracker, WindowScraper},
};

use super::jobs;

pub struct Scheduler {
    settings: SchedulerSettings,
    trackers: Vec<Arc<HeadTracker>>,
    scrapers: Vec<Arc<WindowScraper>>,
    aggregator: Arc<PriceAggregator>,
}

impl Scheduler {
    pub fn new(
        settings: SchedulerSettings,
        trackers: Vec<Arc<HeadTracker>>,
        scrapers: Vec<Arc<WindowScraper>>,
        aggregator: Arc<PriceAggregator>,
    ) -> Self {
        Self {
            settings,
            trackers,
            scrapers,
            aggregator,
        }
    }

    /// Starts header subscriptions, runs the startup pass, then the cadences until
    /// cancellation. In-flight jobs finish before this returns.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let subscriptions: Vec<_> = self
            .trackers
            .iter()
            .filter(|tracker| tracker.mode() == HeadMode::Subscribe)
            .cloned()
            .map(|tracker| {
                let token = cancellation_token.child_token();
                tokio::spawn(async move { tracker.run_subscription(token).await })
            })
            .collect();

        self.startup(&cancellation_token).await;

        if !cancellation_token.is_cancelled() {
            info!(
                "Scheduler started: heads every {}s, scrapes every {}s, prices every {}s",
                self.settings.head_interval_secs,
                self.settings.scrape_interval_secs,
                self.settings.price_interval_secs
            );

            tokio::join!(
                cadence(
                    "head_refresh",
                    self.settings.head_interval_secs,
                    &cancellation_token,
                    || jobs::head_refresh::run(&self.trackers),
                ),
                cadence(
                    "scrape_transfers",
                    self.settings.scrape_interval_secs,
                    &cancellation_token,
                    || jobs::scrape_transfers::run(&self.scrapers),
                ),
                cadence(
                    "price_snapshot",
                    self.settings.price_interval_secs,
                    &cancellation_token,
                    || jobs::price_snapshot::run(&self.aggregator),
                ),
            );
        }

        info!("Scheduler shutting down...");
        for handle in subscriptions {
            let _ = handle.await;
        }
        Ok(())
    }

    /// One head refresh and price snapshot, then catch-up of every task to the head.
    async fn startup(&self, cancellation_token: &CancellationToken) {
        if let Err(e) = jobs::head_refresh::run(&self.trackers).await {
            error!("Startup head refresh failed: {:#}", e);
        }

        if let Err(e) = jobs::price_snapshot::run(&self.aggregator).await {
            error!("Startup price snapshot failed: {:#}", e);
        }

        if let Err(e) = CatchUpCoordinator::new(self.scrapers.clone())
            .run(cancellation_token)
            .await
        {
            error!("Catch-up failed: {:#}", e);
        }
    }
}

/// Runs `job` every `every_secs` until cancelled. A run that overruns the period delays
/// the next one instead of overlapping it; errors are logged and the loop continues.
async fn cadence<F, Fut>(
    name: &str,
    every_secs: u64,
    cancellation_token: &CancellationToken,
    job: F,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut interval = tokio::time::interval(Duration::from_secs(every_secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick fires immediately; startup already covered it.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,
            _ = interval.tick() => {},
        }

        if let Err(e) = job().await {
            error!("Job {} failed: {:#}", name, e);
        }
    }

    info!("Stopped {} cadence", name);
}
