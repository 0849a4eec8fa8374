/// Checkpoint key namespace (PostgreSQL `kv` table).
///
/// Head heights are written by one chain's head tracker, last-scraped blocks by one task's
/// scraper. Range and lookback keys are operator tunables seeded from configuration on
/// first read.
pub struct CheckpointKey;

impl CheckpointKey {
    /// Highest block known on `chain`.
    pub fn block_height(chain: &str) -> String {
        format!("block_height_{}", chain.to_lowercase())
    }

    /// Last block scraped for `symbol` on `chain`.
    pub fn last_block(chain: &str, symbol: &str) -> String {
        format!("last_block_{}_{}", chain.to_lowercase(), symbol.to_lowercase())
    }

    /// Blocks advanced per scraper invocation.
    pub fn scrape_range(chain: &str, symbol: &str) -> String {
        format!("scrape_range_{}_{}", chain.to_lowercase(), symbol.to_lowercase())
    }

    /// Already-scraped blocks re-examined per invocation.
    pub fn scrape_lookback(chain: &str, symbol: &str) -> String {
        format!(
            "scrape_range_lookback_{}_{}",
            chain.to_lowercase(),
            symbol.to_lowercase()
        )
    }
}
