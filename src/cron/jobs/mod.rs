pub mod head_refresh;
pub mod price_snapshot;
pub mod scrape_transfers;
