//! Transfer scraping.
//!
//! - [`task`] - One (chain, asset) stream and its checkpoint keys
//! - [`window`] - Scan window arithmetic
//! - [`scraper`] - Window scans for native and ERC20 transfers
//! - [`catch_up`] - Concurrent catch-up of every task to the head
//! - [`head`] - Head height polling and header subscriptions

pub mod catch_up;
pub mod head;
pub mod scraper;
pub mod task;
pub mod window;

pub use catch_up::{catch_up, CatchUpCoordinator, CatchUpReport};
pub use head::HeadTracker;
pub use scraper::{ScrapeOutcome, TickOutcome, WindowScraper};
pub use task::{AssetKind, ChainAssetTask};
pub use window::ScanWindow;
