use std::time::Duration;

use anyhow::Context;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use log::{info, warn};
use tokio_postgres::NoTls;

use crate::config::PostgresSettings;

const MAX_CONNECT_ATTEMPTS: u32 = 3;

const SCHEMA_PATH: &str = "schema/postgres.sql";

/// PostgreSQL client with connection pooling.
///
/// Backs the checkpoint store, transfer and price ledgers and the recipient whitelist.
/// Uses `deadpool-postgres` for connection management.
#[derive(Clone)]
pub struct PostgresClient {
    pub pool: Pool,
}

impl PostgresClient {
    pub async fn new(settings: PostgresSettings) -> anyhow::Result<Self> {
        info!("Connecting to PostgreSQL at {}:{}", settings.host, settings.port);

        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&settings.host)
            .port(settings.port)
            .user(&settings.user)
            .password(&settings.password)
            .dbname(&settings.database);

        let mgr = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(mgr)
            .max_size(settings.pool_size)
            .build()
            .context("Failed to create PostgreSQL connection pool")?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match pool.get().await {
                Ok(_conn) => {
                    info!("Successfully connected to PostgreSQL");
                    return Ok(Self { pool });
                },
                Err(e) if attempt < MAX_CONNECT_ATTEMPTS => {
                    let delay = Duration::from_millis(100 * 2_u64.pow(attempt));
                    warn!(
                        "Failed to connect to PostgreSQL (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt, MAX_CONNECT_ATTEMPTS, e, delay
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(e) => {
                    return Err(anyhow::anyhow!(
                        "Failed to connect to PostgreSQL after {} attempts: {}",
                        MAX_CONNECT_ATTEMPTS,
                        e
                    ));
                },
            }
        }
    }

    /// Applies `schema/postgres.sql`. Every statement in it is idempotent.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        info!("Running PostgreSQL migrations");
        let client = self.pool.get().await?;

        let schema = tokio::fs::read_to_string(SCHEMA_PATH)
            .await
            .with_context(|| format!("Failed to read {}", SCHEMA_PATH))?;

        client
            .batch_execute(&schema)
            .await
            .context("Failed to apply PostgreSQL schema")?;

        info!("PostgreSQL migrations completed successfully");
        Ok(())
    }
}
