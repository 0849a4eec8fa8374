use std::sync::Arc;

use log::info;

use crate::config::Settings;

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PostgresClient;
pub use store::{CheckpointStore, PriceLedger, TransferLedger, Whitelist};

/// Database handle shared by every component.
///
/// PostgreSQL holds checkpoints, the transfer and price ledgers and the whitelist.
/// Constructed once at startup and injected; there is no process-wide connection.
#[derive(Clone)]
pub struct Database {
    pub postgres: Arc<PostgresClient>,
}

impl Database {
    pub async fn new(settings: Arc<Settings>) -> anyhow::Result<Self> {
        let postgres = PostgresClient::new(settings.postgres.clone()).await?;

        postgres.migrate().await?;
        info!("Database ready");

        Ok(Self {
            postgres: Arc::new(postgres),
        })
    }

    pub fn checkpoints(&self) -> Arc<dyn CheckpointStore> {
        self.postgres.clone()
    }

    pub fn transfers(&self) -> Arc<dyn TransferLedger> {
        self.postgres.clone()
    }

    pub fn prices(&self) -> Arc<dyn PriceLedger> {
        self.postgres.clone()
    }

    pub fn whitelist(&self) -> Arc<dyn Whitelist> {
        self.postgres.clone()
    }
}
