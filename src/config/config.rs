use std::collections::HashSet;

use alloy::primitives::Address;
use anyhow::{bail, Context};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// PostgreSQL database connection configuration.
///
/// Used for storing:
/// - Checkpoints (head heights, scrape progress, tunables)
/// - Transfer ledger
/// - Price snapshots
/// - Whitelisted recipient addresses
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    16
}

/// How a chain's head height is kept current.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HeadMode {
    /// Push: new-header subscription over `ws_url`, with the fast cadence as polling fallback.
    Subscribe,
    /// Poll: fast cadence only.
    #[default]
    Poll,
}

/// Native asset (ETH, BNB, ...) scraping for a chain.
#[derive(Debug, Deserialize, Clone)]
pub struct NativeAssetSettings {
    #[serde(default)]
    pub enabled: bool,
    pub symbol: String,
    #[serde(default = "default_native_decimals")]
    pub decimals: u8,
    /// Fetching whole blocks is O(block size), so the default range is short.
    #[serde(default = "default_native_scan_range")]
    pub scan_range: u64,
    #[serde(default = "default_overlap")]
    pub overlap: u64,
}

fn default_native_decimals() -> u8 {
    18
}

fn default_native_scan_range() -> u64 {
    500
}

/// ERC20 token scraping for a chain.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenSettings {
    pub symbol: String,
    pub address: String,
    #[serde(default = "default_token_decimals")]
    pub decimals: u8,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Log filtering is O(matching events), so the default range is long.
    #[serde(default = "default_token_scan_range")]
    pub scan_range: u64,
    #[serde(default = "default_overlap")]
    pub overlap: u64,
}

fn default_token_decimals() -> u8 {
    18
}

fn default_enabled() -> bool {
    true
}

fn default_token_scan_range() -> u64 {
    5_000
}

fn default_overlap() -> u64 {
    50
}

/// One chain to ingest from.
#[derive(Debug, Deserialize, Clone)]
pub struct ChainSettings {
    /// Short name used in checkpoint keys and logs (e.g. `mainnet`).
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Block to start from when no checkpoint exists yet.
    #[serde(default)]
    pub start_block: u64,
    #[serde(default)]
    pub head_mode: HeadMode,
    /// Run an incremental scrape for this chain's tasks on every new header.
    #[serde(default = "default_enabled")]
    pub scrape_on_header: bool,
    #[serde(default)]
    pub native: Option<NativeAssetSettings>,
    /// Recipients whose incoming native transfers are recorded, merged with the database list.
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub tokens: Vec<TokenSettings>,
}

/// Price feed contracts.
///
/// `primary_oracle` prices the primary chain's native asset, `reference_oracle` prices the
/// reference asset, and `pool` is the secondary token / native asset liquidity pool.
#[derive(Debug, Deserialize, Clone)]
pub struct PriceSettings {
    /// Name of the chain (from `chains`) the contracts live on.
    pub chain: String,
    pub primary_oracle: String,
    pub reference_oracle: String,
    pub pool: String,
    /// Substituted, in cents, when the derived token price is exactly zero.
    #[serde(default = "default_fallback_token_cents")]
    pub fallback_token_cents: String,
}

fn default_fallback_token_cents() -> String {
    "80".to_string()
}

/// Cadences of the scheduler loop.
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerSettings {
    #[serde(default = "default_head_interval")]
    pub head_interval_secs: u64,
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval_secs: u64,
    #[serde(default = "default_price_interval")]
    pub price_interval_secs: u64,
}

fn default_head_interval() -> u64 {
    12
}

fn default_scrape_interval() -> u64 {
    20
}

fn default_price_interval() -> u64 {
    60
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            head_interval_secs: default_head_interval(),
            scrape_interval_secs: default_scrape_interval(),
            price_interval_secs: default_price_interval(),
        }
    }
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup, with `PRICEFEED__` prefixed environment
/// variables layered on top (e.g. `PRICEFEED__POSTGRES__PASSWORD`).
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub postgres: PostgresSettings,
    pub chains: Vec<ChainSettings>,
    pub prices: PriceSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
}

fn default_rpc_timeout() -> u64 {
    30
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .add_source(Environment::with_prefix("PRICEFEED").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }

    /// Rejects configurations that would only fail later inside a running task.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut names = HashSet::new();
        for chain in &self.chains {
            if !names.insert(chain.name.as_str()) {
                bail!("Duplicate chain name '{}'", chain.name);
            }
            if chain.head_mode == HeadMode::Subscribe && chain.ws_url.is_none() {
                bail!("Chain '{}' uses head_mode subscribe but has no ws_url", chain.name);
            }
            if let Some(native) = &chain.native {
                if native.scan_range == 0 {
                    bail!("Chain '{}' native scan_range must be positive", chain.name);
                }
            }
            for token in &chain.tokens {
                parse_address(&token.address)
                    .with_context(|| format!("Token {} on '{}'", token.symbol, chain.name))?;
                if token.scan_range == 0 {
                    bail!(
                        "Token {} on '{}' scan_range must be positive",
                        token.symbol,
                        chain.name
                    );
                }
            }
            for address in &chain.whitelist {
                parse_address(address)
                    .with_context(|| format!("Whitelist entry on '{}'", chain.name))?;
            }
        }

        if !names.contains(self.prices.chain.as_str()) {
            bail!("Price chain '{}' is not a configured chain", self.prices.chain);
        }
        parse_address(&self.prices.primary_oracle).context("prices.primary_oracle")?;
        parse_address(&self.prices.reference_oracle).context("prices.reference_oracle")?;
        parse_address(&self.prices.pool).context("prices.pool")?;
        self.prices
            .fallback_token_cents
            .parse::<bigdecimal::BigDecimal>()
            .context("prices.fallback_token_cents")?;

        Ok(())
    }
}

/// Parse a hex address from configuration.
pub fn parse_address(value: &str) -> anyhow::Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .with_context(|| format!("Invalid address '{}'", value))
}
