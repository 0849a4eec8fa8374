pub mod abis;
pub mod chain;
pub mod config;
pub mod cron;
pub mod db;
pub mod prices;
pub mod scraper;
pub mod utils;

#[cfg(test)]
mod testing;

pub use chain::AlloyChain;
pub use config::Settings;
pub use cron::Scheduler;
pub use db::Database;
pub use prices::PriceAggregator;
pub use scraper::{CatchUpCoordinator, ChainAssetTask, HeadTracker, WindowScraper};
