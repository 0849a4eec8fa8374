use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use pricefeed::{
    config::parse_address, AlloyChain, ChainAssetTask, Database, HeadTracker, PriceAggregator,
    Scheduler, Settings, WindowScraper,
};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .context("Failed to initialise logger")?;

    // Load configuration
    let settings = Arc::new(
        Settings::new()
            .context("Failed to load config.yaml. Please ensure it exists and is valid")?,
    );
    settings.validate().context("Invalid configuration")?;

    let db = Database::new(settings.clone())
        .await
        .context("Failed to initialize database connection")?;

    let scheduler = build_scheduler(&settings, &db).await?;

    run(scheduler).await
}

/// Connects every chain and wires scrapers, head trackers and the price aggregator.
async fn build_scheduler(settings: &Settings, db: &Database) -> anyhow::Result<Scheduler> {
    let rpc_timeout = Duration::from_secs(settings.rpc_timeout_secs);

    let mut chains = HashMap::new();
    let mut trackers = Vec::new();
    let mut scrapers = Vec::new();

    for chain_settings in &settings.chains {
        let chain = Arc::new(
            AlloyChain::connect(chain_settings, rpc_timeout)
                .await
                .with_context(|| format!("Failed to connect to chain {}", chain_settings.name))?,
        );

        let recipients = chain_settings
            .whitelist
            .iter()
            .map(|address| parse_address(address))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut chain_scrapers = Vec::new();
        for task in ChainAssetTask::from_chain(chain_settings)? {
            let scraper = Arc::new(WindowScraper::new(
                task,
                chain.clone(),
                db.checkpoints(),
                db.transfers(),
                db.whitelist(),
                recipients.clone(),
            ));

            if let Err(e) = scraper.verify_decimals().await {
                warn!(
                    "Could not verify decimals of {}: {:#}",
                    scraper.task().label(),
                    e
                );
            }

            info!(
                "Configured {} ({})",
                scraper.task().label(),
                if scraper.task().enabled { "enabled" } else { "disabled" }
            );
            chain_scrapers.push(scraper);
        }

        let tracker = HeadTracker::new(
            chain_settings.name.clone(),
            chain_settings.head_mode,
            chain.clone(),
            db.checkpoints(),
        );
        let tracker = if chain_settings.scrape_on_header {
            tracker.with_scrapers(chain_scrapers.clone())
        } else {
            tracker
        };

        trackers.push(Arc::new(tracker));
        scrapers.extend(chain_scrapers);
        chains.insert(chain_settings.name.clone(), chain);
    }

    let price_chain = chains
        .get(&settings.prices.chain)
        .with_context(|| format!("Price chain {} is not configured", settings.prices.chain))?;
    let aggregator = PriceAggregator::new(
        &settings.prices,
        price_chain.clone(),
        price_chain.clone(),
        db.prices(),
    )?;

    Ok(Scheduler::new(
        settings.scheduler.clone(),
        trackers,
        scrapers,
        Arc::new(aggregator),
    ))
}

async fn run(scheduler: Scheduler) -> anyhow::Result<()> {
    let cancellation_token = CancellationToken::new();

    let scheduler_token = cancellation_token.child_token();
    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.run(scheduler_token).await {
            error!("Scheduler failed: {:#}", e);
        }
    });

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    info!("Price feed running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    cancellation_token.cancel();

    info!("Waiting for scheduler to stop...");
    let _ = scheduler_handle.await;

    info!("Stopped");
    Ok(())
}
